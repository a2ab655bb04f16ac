use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use worldfile::chunk::opcode::OBJECTS_GROUP;
use worldfile::chunk::{reader, writer};
use worldfile::{window, Node, OpcodeTable, ReadConfig, Section, Terrain, WorldHeader};

#[derive(Parser)]
#[command(name = "worldfile", about = "World file inspection and conversion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show header pointers, box/scene names and section sizes.
    Info {
        /// Path to a world file.
        file: PathBuf,
    },
    /// Print the decoded tree.
    Dump {
        /// Path to a world file.
        file: PathBuf,
        /// Print JSON instead of an indented outline.
        #[arg(long)]
        json: bool,
        /// Trailing sections to leave out (e.g. "textures", "sfx").
        #[arg(long = "skip-section")]
        skip_sections: Vec<String>,
    },
    /// Decode a world file and encode it again.
    Rewrite {
        /// Path to a world file.
        file: PathBuf,
        /// Output path.
        #[arg(short, long)]
        output: PathBuf,
        /// Trailing sections to drop; they are written back empty.
        #[arg(long = "skip-section")]
        skip_sections: Vec<String>,
    },
    /// Encode a JSON tree (as printed by `dump --json`) into a world file.
    FromJson {
        /// Path to a JSON tree.
        file: PathBuf,
        /// Output path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show a heightfield header and its active cell count.
    TerrainInfo {
        /// Path to a heightfield file.
        file: PathBuf,
    },
    /// Write an empty heightfield.
    TerrainNew {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Output path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decompress a window-compressed blob.
    Decompress {
        /// Path to the compressed data.
        file: PathBuf,
        /// Decompressed size in bytes.
        #[arg(long)]
        size: usize,
        /// Output path.
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn load_world(path: &Path, skip_sections: &[String]) -> Result<Node> {
    for name in skip_sections {
        if Section::from_key(name).is_none() {
            bail!("unknown section: {name}");
        }
    }
    let skip: Vec<&str> = skip_sections.iter().map(String::as_str).collect();
    let config = ReadConfig::from_skip_list(&skip);
    let data = read_file(path)?;
    reader::read(&data, &OpcodeTable::standard(), &config)
        .with_context(|| format!("failed to decode {}", path.display()))
}

fn cmd_info(file: &Path) -> Result<()> {
    let data = read_file(file)?;
    let header = WorldHeader::parse(&data)
        .with_context(|| format!("failed to parse header of {}", file.display()))?;
    let root = reader::read(&data, &OpcodeTable::standard(), &ReadConfig::default())?;

    let text = |name: &str| {
        root.find_child_leaf(name)
            .and_then(|l| l.as_str())
            .unwrap_or("")
            .to_string()
    };
    println!("File:    {} ({} bytes)", file.display(), data.len());
    println!("Box:     {}", text(reader::BOX_LEAF));
    println!("Scene:   {}", text(reader::SCENE_LEAF));
    println!("Main:    {:#x}", header.main_block);
    let objects = root
        .find_child_node(OBJECTS_GROUP)
        .map_or(0, Node::node_count);
    println!("Objects: {objects}");
    println!("Sections:");
    for section in Section::ALL {
        let records = root.find_child_node(section.node_name()).map_or(0, |n| {
            n.leaf_count() + n.node_count()
        });
        println!(
            "  - {:<14} at {:#x}: {records} records",
            section.key(),
            header.sections[section.index()]
        );
    }
    Ok(())
}

fn cmd_dump(file: &Path, json: bool, skip_sections: &[String]) -> Result<()> {
    let root = load_world(file, skip_sections)?;
    if json {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        serde_json::to_writer_pretty(&mut out, &root)?;
        writeln!(out)?;
    } else {
        print!("{root}");
    }
    Ok(())
}

fn cmd_rewrite(file: &Path, output: &Path, skip_sections: &[String]) -> Result<()> {
    let root = load_world(file, skip_sections)?;
    let bytes = writer::write(&root, &OpcodeTable::standard())
        .with_context(|| format!("failed to encode {}", file.display()))?;
    write_file(output, &bytes)?;
    eprintln!("[rewrite] {} -> {} ({} bytes)", file.display(), output.display(), bytes.len());
    Ok(())
}

fn cmd_from_json(file: &Path, output: &Path) -> Result<()> {
    let f = File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    let root: Node = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("failed to parse tree: {}", file.display()))?;
    let bytes = writer::write(&root, &OpcodeTable::standard())
        .with_context(|| format!("failed to encode {}", file.display()))?;
    write_file(output, &bytes)?;
    eprintln!("[from-json] wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

fn cmd_terrain_info(file: &Path) -> Result<()> {
    let data = read_file(file)?;
    let terrain = Terrain::decode(&data)
        .with_context(|| format!("failed to decode heightfield {}", file.display()))?;
    let h = &terrain.header;
    println!("Size:     {}x{}", h.width, h.height);
    println!("Offset:   ({}, {})", h.x_offset, h.y_offset);
    println!("Height:   {} .. {}", h.min_height, h.max_height);
    println!("Stretch:  {}", h.stretch);
    println!("Scale:    {}", h.scale);
    println!("Texture:  {}", h.texture);
    println!("Active:   {} cells", terrain.active_cells().count());
    Ok(())
}

fn cmd_terrain_new(width: u32, height: u32, output: &Path) -> Result<()> {
    let terrain = Terrain::new(width, height)?;
    write_file(output, &terrain.encode()?)?;
    eprintln!("[terrain] wrote empty {width}x{height} grid to {}", output.display());
    Ok(())
}

fn cmd_decompress(file: &Path, size: usize, output: &Path) -> Result<()> {
    let data = read_file(file)?;
    let bytes = window::decompress(&data, size);
    if bytes.len() < size {
        log::warn!("[decompress] {} is short: {} of {size} bytes", file.display(), bytes.len());
    }
    write_file(output, &bytes)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Info { file } => cmd_info(file),
        Command::Dump {
            file,
            json,
            skip_sections,
        } => cmd_dump(file, *json, skip_sections),
        Command::Rewrite {
            file,
            output,
            skip_sections,
        } => cmd_rewrite(file, output, skip_sections),
        Command::FromJson { file, output } => cmd_from_json(file, output),
        Command::TerrainInfo { file } => cmd_terrain_info(file),
        Command::TerrainNew {
            width,
            height,
            output,
        } => cmd_terrain_new(*width, *height, output),
        Command::Decompress { file, size, output } => cmd_decompress(file, *size, output),
    }
}
