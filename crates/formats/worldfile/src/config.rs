use crate::chunk::section::Section;

/// Which trailing sections the reader parses. Disabled sections are left out
/// of the tree entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadConfig {
    pub textures: bool,
    pub sfx: bool,
    pub objdefs: bool,
    pub fx: bool,
    pub scenerios: bool,
    pub includefiles: bool,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            textures: true,
            sfx: true,
            objdefs: true,
            fx: true,
            scenerios: true,
            includefiles: true,
        }
    }
}

impl ReadConfig {
    /// Create a config with all sections enabled except those in the skip list.
    ///
    /// Names correspond to `Section::key()` values:
    /// - `"textures"`
    /// - `"sfx"`
    /// - `"objdefs"`
    /// - `"fx"`
    /// - `"scenerios"`
    /// - `"includefiles"`
    ///
    /// Unknown names are ignored.
    pub fn from_skip_list(skip: &[&str]) -> Self {
        let mut config = Self::default();
        for name in skip {
            if let Some(section) = Section::from_key(name) {
                *config.flag_mut(section) = false;
            }
        }
        config
    }

    pub fn reads(&self, section: Section) -> bool {
        match section {
            Section::Textures => self.textures,
            Section::Sfx => self.sfx,
            Section::ObjDefs => self.objdefs,
            Section::Fx => self.fx,
            Section::Scenerios => self.scenerios,
            Section::IncludeFiles => self.includefiles,
        }
    }

    fn flag_mut(&mut self, section: Section) -> &mut bool {
        match section {
            Section::Textures => &mut self.textures,
            Section::Sfx => &mut self.sfx,
            Section::ObjDefs => &mut self.objdefs,
            Section::Fx => &mut self.fx,
            Section::Scenerios => &mut self.scenerios,
            Section::IncludeFiles => &mut self.includefiles,
        }
    }
}
