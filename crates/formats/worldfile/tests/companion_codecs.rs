use worldfile::heightfield::{DEFAULT_LIGHT, EMPTY_TRIANGLE, TERRAIN_HEADER_SIZE};
use worldfile::{window, Terrain};

#[test]
fn empty_terrain_reloads_with_same_header() {
    let terrain = Terrain::new(2, 2).unwrap();
    let back = Terrain::decode(&terrain.encode().unwrap()).unwrap();
    assert_eq!(back.header.width, 2);
    assert_eq!(back.header.height, 2);
    assert_eq!(back.header.stretch, terrain.header.stretch);
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(back.cell(x, y).unwrap().height, terrain.header.min_height);
        }
    }
}

/// Active cells come back exactly; every other cell comes back as the
/// header default regardless of what it held.
#[test]
fn reload_loses_only_inactive_cells() {
    let mut terrain = Terrain::new(9, 7).unwrap();
    terrain.header.min_height = -2.0;
    terrain.header.texture = "sand.tex".into();
    for y in 0..7 {
        for x in 0..9 {
            let cell = terrain.cell_mut(x, y).unwrap();
            cell.height = (x * 10 + y) as f32;
            cell.light = [x as u8, y as u8, 7];
            if (x + 2 * y) % 5 == 0 {
                cell.triangle = 1 + (x % 3) as u8;
            }
        }
    }

    let back = Terrain::decode(&terrain.encode().unwrap()).unwrap();
    assert_eq!(back.header, terrain.header);
    for y in 0..7 {
        for x in 0..9 {
            let got = back.cell(x, y).unwrap();
            if terrain.is_active(x, y) {
                assert_eq!(got, terrain.cell(x, y).unwrap(), "({x}, {y})");
            } else {
                assert_eq!(got.height, -2.0);
                assert_eq!(got.triangle, EMPTY_TRIANGLE);
                assert_eq!(got.light, DEFAULT_LIGHT);
            }
        }
    }
}

/// Walk the run stream of an encoded grid, returning `(literal, count)`.
fn runs(bytes: &[u8]) -> Vec<(bool, usize)> {
    let mut pos = TERRAIN_HEADER_SIZE;
    let mut out = Vec::new();
    while pos < bytes.len() {
        let control = bytes[pos] as usize;
        pos += 1;
        if control < 0x80 {
            out.push((true, control + 1));
            pos += (control + 1) * 8;
        } else {
            out.push((false, 256 - control));
        }
    }
    out
}

#[test]
fn runs_never_exceed_128_cells() {
    let mut terrain = Terrain::new(40, 10).unwrap();
    for x in 0..40 {
        for y in 0..5 {
            terrain.cell_mut(x, y).unwrap().triangle = 2;
        }
    }
    let runs = runs(&terrain.encode().unwrap());
    assert!(runs.iter().all(|&(_, n)| (1..=128).contains(&n)));
    let total: usize = runs.iter().map(|&(_, n)| n).sum();
    assert_eq!(total, 400);
    // Rows 0..=5 are active (row 5 via its lower neighbours).
    assert_eq!(runs.iter().filter(|r| r.0).map(|r| r.1).sum::<usize>(), 240);
}

#[test]
fn decompressor_fills_unwritten_window_with_spaces() {
    // A reference to slot 0 before any output exists.
    let out = window::decompress(&[0b01, b'#', 0x00, 0x01], 5);
    assert_eq!(out, b"#    ");
}

#[test]
fn decompressor_round_trips_literal_streams() {
    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let packed = window::compress_literal(&data);
    assert_eq!(window::decompress(&packed, data.len()), data);
    assert_eq!(window::decompress(&packed, 10), &data[..10]);
}
