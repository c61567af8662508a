use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::rendering::Canvas;
use super::sprite::{Layer, Sprite, SpriteId, SpriteManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateStatus {
    /// Not started yet; unusable.
    Invalid,
    /// Rendering and updating.
    Active,
    /// Rendering only; updates are skipped.
    Paused,
    /// Finished; sprites have been dropped.
    Ended,
}

impl fmt::Display for StateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StateStatus::Invalid => "invalid",
            StateStatus::Active => "active",
            StateStatus::Paused => "paused",
            StateStatus::Ended => "ended",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error(
        "game state '{name}' is {status}; start it before use or discard it"
    )]
    Invalid { name: String, status: StateStatus },
}

/// One screen of the game (a level, a menu, a sub-area) with its own
/// sprites, so switching states does not reload anything.
pub struct GameState {
    name: String,
    status: StateStatus,
    sprites: Option<SpriteManager>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("sprite_count", &self.sprites.as_ref().map(SpriteManager::len))
            .finish()
    }
}

impl GameState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StateStatus::Invalid,
            sprites: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StateStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.status, StateStatus::Active | StateStatus::Paused)
    }

    /// Creates a fresh sprite manager and activates the state. Ended states
    /// may be started again; starting a live state does nothing.
    pub fn start(&mut self) {
        if self.is_valid() {
            return;
        }
        self.sprites = Some(SpriteManager::new());
        self.status = StateStatus::Active;
        debug!(state = %self.name, "state_started");
    }

    pub fn pause(&mut self) -> Result<(), StateError> {
        self.ensure_valid()?;
        self.status = StateStatus::Paused;
        debug!(state = %self.name, "state_paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), StateError> {
        self.ensure_valid()?;
        self.status = StateStatus::Active;
        debug!(state = %self.name, "state_resumed");
        Ok(())
    }

    pub fn end(&mut self) {
        self.status = StateStatus::Ended;
        self.sprites = None;
        debug!(state = %self.name, "state_ended");
    }

    /// Paused states still render.
    pub fn render(&self, canvas: &mut dyn Canvas) -> Result<(), StateError> {
        self.sprite_manager()?.render_list(canvas);
        Ok(())
    }

    /// Paused states skip the update without error.
    pub fn update(&mut self, dt_ms: f32) -> Result<(), StateError> {
        self.ensure_valid()?;
        if self.status == StateStatus::Paused {
            return Ok(());
        }
        self.sprite_manager_mut()?.update_list(dt_ms);
        Ok(())
    }

    pub fn add_sprite(
        &mut self,
        sprite: Box<dyn Sprite>,
        layer: Layer,
    ) -> Result<SpriteId, StateError> {
        Ok(self.sprite_manager_mut()?.add_sprite(sprite, layer))
    }

    pub fn add_player_character(&mut self, sprite: Box<dyn Sprite>) -> Result<SpriteId, StateError> {
        Ok(self.sprite_manager_mut()?.add_player_character(sprite))
    }

    pub fn set_static_background(
        &mut self,
        sprite: Option<Box<dyn Sprite>>,
    ) -> Result<(), StateError> {
        self.sprite_manager_mut()?.set_static_background(sprite);
        Ok(())
    }

    pub fn set_background_fill(&mut self, color: Option<[u8; 4]>) -> Result<(), StateError> {
        self.sprite_manager_mut()?.set_background_fill(color);
        Ok(())
    }

    pub fn sprite_mut(
        &mut self,
        id: SpriteId,
    ) -> Result<Option<&mut (dyn Sprite + 'static)>, StateError> {
        Ok(self.sprite_manager_mut()?.get_mut(id))
    }

    pub fn remove_sprite(&mut self, id: SpriteId) -> Result<Option<Box<dyn Sprite>>, StateError> {
        Ok(self.sprite_manager_mut()?.remove(id))
    }

    pub fn sprites(&self) -> Result<&SpriteManager, StateError> {
        self.sprite_manager()
    }

    pub fn sprites_mut(&mut self) -> Result<&mut SpriteManager, StateError> {
        self.sprite_manager_mut()
    }

    fn ensure_valid(&self) -> Result<(), StateError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    fn sprite_manager(&self) -> Result<&SpriteManager, StateError> {
        self.ensure_valid()?;
        self.sprites.as_ref().ok_or_else(|| self.invalid())
    }

    fn sprite_manager_mut(&mut self) -> Result<&mut SpriteManager, StateError> {
        self.ensure_valid()?;
        let error = self.invalid();
        self.sprites.as_mut().ok_or(error)
    }

    fn invalid(&self) -> StateError {
        StateError::Invalid {
            name: self.name.clone(),
            status: self.status,
        }
    }
}
