//! JSON save file holding every known character record.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use wayfarer_shared::{Character, CharacterId};

use crate::error::CombatError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    #[serde(default)]
    pub characters: BTreeMap<CharacterId, Character>,
}

impl SaveFile {
    /// Read a save file. A missing file is an empty save.
    pub async fn load(path: &Path) -> Result<Self, CombatError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let save: SaveFile = serde_json::from_str(&contents)?;
                info!(
                    "Loaded {} character(s) from {}",
                    save.characters.len(),
                    path.display()
                );
                Ok(save)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No save file at {}, starting fresh", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file so a crash never leaves half a save
    pub async fn store(&self, path: &Path) -> Result<(), CombatError> {
        let contents = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn put(&mut self, character: Character) {
        self.characters.insert(character.id, character);
    }
}
