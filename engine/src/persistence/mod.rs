//! Persistence layer for character records.
//!
//! All file I/O happens in a background task. The game loop only talks to
//! it through a [`PersistenceHandle`] and never waits on a write.

mod store;

pub use store::SaveFile;

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot};
use wayfarer_shared::{Character, CharacterId};

use crate::error::CombatError;

/// Commands sent to the persistence background task
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Store a character record and write the save file
    SaveCharacter { character: Character },
    /// Load a character record (response sent via oneshot channel)
    LoadCharacter {
        character_id: CharacterId,
        response: oneshot::Sender<Option<Character>>,
    },
    /// Write the save file if anything changed since the last write
    Flush,
    /// Write outstanding changes and stop; acknowledged once done
    Shutdown { done: oneshot::Sender<()> },
}

/// Handle for sending commands to the persistence task
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    /// Save a character (fire and forget, non-blocking)
    pub fn save_character(&self, character: Character) {
        let id = character.id;
        if self
            .sender
            .try_send(PersistenceCommand::SaveCharacter { character })
            .is_err()
        {
            warn!("Persistence queue unavailable, character {} not saved", id);
        }
    }

    /// Load a character record.
    ///
    /// `MissingPlayer` means the save has no such character; `MissingSaveData`
    /// means the persistence task is gone and nothing can be loaded at all.
    pub async fn require_character(&self, character_id: CharacterId) -> Result<Character, CombatError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PersistenceCommand::LoadCharacter { character_id, response: tx })
            .await
            .map_err(|_| CombatError::MissingSaveData)?;
        rx.await
            .map_err(|_| CombatError::MissingSaveData)?
            .ok_or(CombatError::MissingPlayer(character_id))
    }

    pub async fn load_character(&self, character_id: CharacterId) -> Option<Character> {
        self.require_character(character_id).await.ok()
    }

    pub fn flush(&self) {
        let _ = self.sender.try_send(PersistenceCommand::Flush);
    }

    /// Stop the task after its pending writes have landed
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(PersistenceCommand::Shutdown { done: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Load the save file and spawn the background task.
/// Returns a handle for sending commands.
pub async fn init(path: impl Into<PathBuf>) -> Result<PersistenceHandle, CombatError> {
    let path = path.into();
    let save = SaveFile::load(&path).await?;

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(persistence_task(path, save, rx));
    info!("Persistence background task started");

    Ok(PersistenceHandle { sender: tx })
}

async fn write_save(path: &Path, save: &SaveFile, dirty: &mut bool) {
    if !*dirty {
        return;
    }
    match save.store(path).await {
        Ok(()) => *dirty = false,
        Err(e) => error!("Failed to write save file {}: {}", path.display(), e),
    }
}

/// Background task that owns the save file
async fn persistence_task(
    path: PathBuf,
    mut save: SaveFile,
    mut rx: mpsc::Receiver<PersistenceCommand>,
) {
    info!("Persistence task running ({})", path.display());
    let mut dirty = false;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::SaveCharacter { character } => {
                info!("Saving character {} ({})", character.id, character.name);
                save.put(character);
                dirty = true;
                // Write-through; Flush only matters after a failed write
                write_save(&path, &save, &mut dirty).await;
            }

            PersistenceCommand::LoadCharacter { character_id, response } => {
                let found = save.get(character_id).cloned();
                if found.is_none() {
                    info!("No saved data for character {}", character_id);
                }
                let _ = response.send(found);
            }

            PersistenceCommand::Flush => {
                write_save(&path, &save, &mut dirty).await;
            }

            PersistenceCommand::Shutdown { done } => {
                write_save(&path, &save, &mut dirty).await;
                info!("Persistence task shutting down");
                let _ = done.send(());
                break;
            }
        }
    }

    info!("Persistence task stopped");
}
