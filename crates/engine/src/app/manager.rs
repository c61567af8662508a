use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::rendering::Canvas;
use super::sprite::{Layer, Sprite, SpriteId};
use super::state::{GameState, StateError, StateStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("game manager has no current state; call start() before use")]
    Uninitialized,
    #[error(transparent)]
    State(#[from] StateError),
}

/// Owns the current game state and at most one retained previous state,
/// and turns clock readings into per-update delta times.
pub struct GameManager {
    clock: Arc<dyn Clock>,
    current: Option<GameState>,
    previous: Option<GameState>,
    last_update: Duration,
}

impl Default for GameManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GameManager {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let last_update = clock.now();
        Self {
            clock,
            current: None,
            previous: None,
            last_update,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    /// Resets the update clock and installs `state` (or a default one) as
    /// the current state. Any previously held states are ended.
    ///
    /// Call this right before the loop starts: the first update measures
    /// time from here.
    pub fn start(&mut self, state: Option<GameState>) {
        self.end_held_states();
        self.set_update_time();
        let mut state = state.unwrap_or_default();
        state.start();
        info!(state = state.name(), "game_manager_started");
        self.current = Some(state);
    }

    /// Ends every held state and returns to the unstarted condition.
    pub fn shutdown(&mut self) {
        self.end_held_states();
        info!("game_manager_shutdown");
    }

    pub fn set_update_time(&mut self) {
        self.last_update = self.clock.now();
    }

    /// Updates the current state with the milliseconds elapsed since the
    /// previous update (or `start`).
    pub fn update(&mut self) -> Result<(), ManagerError> {
        let now = self.clock.now();
        let dt_ms = now.saturating_sub(self.last_update).as_micros() as f32 / 1000.0;
        self.current_mut()?.update(dt_ms)?;
        self.last_update = now;
        Ok(())
    }

    pub fn render(&self, canvas: &mut dyn Canvas) -> Result<(), ManagerError> {
        self.current_ref()?.render(canvas)?;
        Ok(())
    }

    /// Switches to `new_state`. With `keep_old_state` the current state is
    /// paused and retained as the single previous state (ending whatever
    /// was retained before); otherwise it is ended.
    pub fn change_state(
        &mut self,
        mut new_state: GameState,
        keep_old_state: bool,
    ) -> Result<(), ManagerError> {
        let mut old_state = self.current.take().ok_or(ManagerError::Uninitialized)?;

        if keep_old_state {
            if let Err(error) = old_state.pause() {
                self.current = Some(old_state);
                return Err(error.into());
            }
            if let Some(mut stale) = self.previous.take() {
                stale.end();
            }
            self.previous = Some(old_state);
        } else {
            old_state.end();
        }

        new_state.start();
        info!(
            state = new_state.name(),
            kept_previous = keep_old_state,
            "game_state_changed"
        );
        self.current = Some(new_state);
        Ok(())
    }

    /// Restores the retained previous state. Returns `Ok(false)` when there
    /// is nothing to revert to.
    pub fn revert_to_previous_state(&mut self) -> Result<bool, ManagerError> {
        if self.current.is_none() {
            return Err(ManagerError::Uninitialized);
        }
        let Some(mut previous) = self.previous.take() else {
            debug!("revert_without_previous_state");
            return Ok(false);
        };

        if let Err(error) = previous.resume() {
            self.previous = Some(previous);
            return Err(error.into());
        }
        if let Some(mut current) = self.current.replace(previous) {
            current.end();
        }
        let name = self.current.as_ref().map(GameState::name).unwrap_or_default();
        info!(state = name, "game_state_reverted");
        Ok(true)
    }

    pub fn has_previous_state(&self) -> bool {
        self.previous.is_some()
    }

    pub fn current_state(&self) -> Option<&GameState> {
        self.current.as_ref()
    }

    pub fn current_state_mut(&mut self) -> Option<&mut GameState> {
        self.current.as_mut()
    }

    pub fn previous_state(&self) -> Option<&GameState> {
        self.previous.as_ref()
    }

    /// Pauses updates of the current state; rendering continues.
    pub fn pause(&mut self) -> Result<(), ManagerError> {
        self.current_mut()?.pause()?;
        Ok(())
    }

    /// Resumes the current state and restarts the update clock so the
    /// paused interval is not fed into the next update.
    pub fn resume(&mut self) -> Result<(), ManagerError> {
        self.current_mut()?.resume()?;
        self.set_update_time();
        Ok(())
    }

    /// Mirrors the current state's status, however it was paused.
    pub fn is_paused(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|state| state.status() == StateStatus::Paused)
    }

    pub fn add_sprite_to_current_state(
        &mut self,
        sprite: Box<dyn Sprite>,
        layer: Layer,
    ) -> Result<SpriteId, ManagerError> {
        Ok(self.current_mut()?.add_sprite(sprite, layer)?)
    }

    /// Scenery only; interactive environment belongs on the midground.
    pub fn add_background_sprite(&mut self, sprite: Box<dyn Sprite>) -> Result<SpriteId, ManagerError> {
        self.add_sprite_to_current_state(sprite, Layer::Background)
    }

    pub fn add_sprite_to_midground_environment(
        &mut self,
        sprite: Box<dyn Sprite>,
    ) -> Result<SpriteId, ManagerError> {
        self.add_sprite_to_current_state(sprite, Layer::MidgroundEnvironment)
    }

    pub fn add_enemy_sprite(&mut self, sprite: Box<dyn Sprite>) -> Result<SpriteId, ManagerError> {
        self.add_sprite_to_current_state(sprite, Layer::Enemies)
    }

    /// The player goes first in the character layer.
    pub fn add_player_sprite(&mut self, sprite: Box<dyn Sprite>) -> Result<SpriteId, ManagerError> {
        Ok(self.current_mut()?.add_player_character(sprite)?)
    }

    pub fn add_non_enemy_character_sprite(
        &mut self,
        sprite: Box<dyn Sprite>,
    ) -> Result<SpriteId, ManagerError> {
        self.add_sprite_to_current_state(sprite, Layer::Characters)
    }

    pub fn add_sprite_to_foreground(
        &mut self,
        sprite: Box<dyn Sprite>,
    ) -> Result<SpriteId, ManagerError> {
        self.add_sprite_to_current_state(sprite, Layer::Foreground)
    }

    /// `None` removes the static background.
    pub fn set_static_game_background(
        &mut self,
        sprite: Option<Box<dyn Sprite>>,
    ) -> Result<(), ManagerError> {
        Ok(self.current_mut()?.set_static_background(sprite)?)
    }

    pub fn set_background_fill(&mut self, color: Option<[u8; 4]>) -> Result<(), ManagerError> {
        Ok(self.current_mut()?.set_background_fill(color)?)
    }

    pub fn sprite_mut(
        &mut self,
        id: SpriteId,
    ) -> Result<Option<&mut (dyn Sprite + 'static)>, ManagerError> {
        Ok(self.current_mut()?.sprite_mut(id)?)
    }

    fn current_ref(&self) -> Result<&GameState, ManagerError> {
        self.current.as_ref().ok_or(ManagerError::Uninitialized)
    }

    fn current_mut(&mut self) -> Result<&mut GameState, ManagerError> {
        self.current.as_mut().ok_or(ManagerError::Uninitialized)
    }

    fn end_held_states(&mut self) {
        for mut state in [self.current.take(), self.previous.take()]
            .into_iter()
            .flatten()
        {
            state.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::clock::ManualClock;
    use crate::app::sprite::test_support::{event_log, RecordingCanvas, TaggedSprite};

    fn manager_with_clock() -> (GameManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let manager = GameManager::with_clock(clock.clone());
        (manager, clock)
    }

    #[test]
    fn operations_before_start_fail_with_uninitialized() {
        let log = event_log();
        let (mut manager, _clock) = manager_with_clock();

        assert_eq!(manager.update(), Err(ManagerError::Uninitialized));
        assert_eq!(
            manager.render(&mut RecordingCanvas::new(1, 1)),
            Err(ManagerError::Uninitialized)
        );
        assert_eq!(
            manager.change_state(GameState::new("next"), true),
            Err(ManagerError::Uninitialized)
        );
        assert_eq!(
            manager.revert_to_previous_state(),
            Err(ManagerError::Uninitialized)
        );
        assert_eq!(
            manager
                .add_player_sprite(TaggedSprite::boxed("p", &log))
                .map(|_| ()),
            Err(ManagerError::Uninitialized)
        );
        assert_eq!(
            manager.set_static_game_background(None),
            Err(ManagerError::Uninitialized)
        );
    }

    #[test]
    fn start_without_state_uses_default_active_state() {
        let (mut manager, _clock) = manager_with_clock();
        manager.start(None);

        let state = manager.current_state().expect("current");
        assert_eq!(state.name(), "default");
        assert_eq!(state.status(), StateStatus::Active);
        assert!(!manager.has_previous_state());
    }

    #[test]
    fn update_passes_elapsed_milliseconds() {
        let log = event_log();
        let (mut manager, clock) = manager_with_clock();
        clock.advance(Duration::from_secs(3));
        manager.start(Some(GameState::new("level")));
        manager
            .add_background_sprite(TaggedSprite::boxed("sky", &log))
            .expect("add");

        clock.advance(Duration::from_millis(16));
        manager.update().expect("update");
        clock.advance(Duration::from_millis(20));
        manager.update().expect("update");

        assert_eq!(*log.borrow(), vec!["update:sky:16", "update:sky:20"]);
    }

    #[test]
    fn revert_without_previous_state_returns_false() {
        let (mut manager, _clock) = manager_with_clock();
        manager.start(Some(GameState::new("world")));

        assert_eq!(manager.revert_to_previous_state(), Ok(false));
        assert_eq!(manager.current_state().expect("current").name(), "world");
    }

    #[test]
    fn change_state_keeping_old_allows_exactly_one_revert() {
        let (mut manager, _clock) = manager_with_clock();
        manager.start(Some(GameState::new("world_3_3")));

        manager
            .change_state(GameState::new("pipe_3_3_a"), true)
            .expect("change");
        assert!(manager.has_previous_state());
        assert_eq!(
            manager.previous_state().expect("previous").status(),
            StateStatus::Paused
        );

        assert_eq!(manager.revert_to_previous_state(), Ok(true));
        let current = manager.current_state().expect("current");
        assert_eq!(current.name(), "world_3_3");
        assert_eq!(current.status(), StateStatus::Active);

        assert_eq!(manager.revert_to_previous_state(), Ok(false));
    }

    #[test]
    fn change_state_without_keeping_discards_old() {
        let (mut manager, _clock) = manager_with_clock();
        manager.start(Some(GameState::new("pipe")));

        manager
            .change_state(GameState::new("world"), false)
            .expect("change");

        assert!(!manager.has_previous_state());
        assert_eq!(manager.revert_to_previous_state(), Ok(false));
    }

    #[test]
    fn only_one_previous_state_is_retained() {
        let (mut manager, _clock) = manager_with_clock();
        manager.start(Some(GameState::new("a")));
        manager.change_state(GameState::new("b"), true).expect("b");
        manager.change_state(GameState::new("c"), true).expect("c");

        assert_eq!(manager.previous_state().expect("previous").name(), "b");
        assert_eq!(manager.revert_to_previous_state(), Ok(true));
        assert_eq!(manager.current_state().expect("current").name(), "b");
        assert_eq!(manager.revert_to_previous_state(), Ok(false));
    }

    #[test]
    fn retained_state_keeps_its_sprites_across_revert() {
        let log = event_log();
        let (mut manager, clock) = manager_with_clock();
        manager.start(Some(GameState::new("world")));
        manager
            .add_player_sprite(TaggedSprite::boxed("hero", &log))
            .expect("add");

        manager
            .change_state(GameState::new("menu"), true)
            .expect("change");
        clock.advance(Duration::from_millis(10));
        manager.update().expect("menu update");
        assert!(log.borrow().is_empty());

        manager.revert_to_previous_state().expect("revert");
        clock.advance(Duration::from_millis(10));
        manager.update().expect("world update");
        manager.render(&mut RecordingCanvas::new(1, 1)).expect("render");

        assert_eq!(*log.borrow(), vec!["update:hero:10", "paint:hero"]);
    }

    #[test]
    fn sprite_helpers_place_sprites_on_expected_layers() {
        let log = event_log();
        let (mut manager, _clock) = manager_with_clock();
        manager.start(None);

        let bg = manager
            .add_background_sprite(TaggedSprite::boxed("bg", &log))
            .expect("bg");
        let env = manager
            .add_sprite_to_midground_environment(TaggedSprite::boxed("env", &log))
            .expect("env");
        let enemy = manager
            .add_enemy_sprite(TaggedSprite::boxed("enemy", &log))
            .expect("enemy");
        let npc = manager
            .add_non_enemy_character_sprite(TaggedSprite::boxed("npc", &log))
            .expect("npc");
        let player = manager
            .add_player_sprite(TaggedSprite::boxed("player", &log))
            .expect("player");
        let fg = manager
            .add_sprite_to_foreground(TaggedSprite::boxed("fg", &log))
            .expect("fg");

        let sprites = manager
            .current_state()
            .expect("current")
            .sprites()
            .expect("sprites");
        assert_eq!(sprites.layer_ids(Layer::Background), vec![bg]);
        assert_eq!(sprites.layer_ids(Layer::MidgroundEnvironment), vec![env]);
        assert_eq!(sprites.layer_ids(Layer::Enemies), vec![enemy]);
        assert_eq!(sprites.layer_ids(Layer::Characters), vec![player, npc]);
        assert_eq!(sprites.layer_ids(Layer::Foreground), vec![fg]);
    }

    #[test]
    fn pause_flag_mirrors_onto_current_state() {
        let log = event_log();
        let (mut manager, clock) = manager_with_clock();
        manager.start(None);
        manager
            .add_background_sprite(TaggedSprite::boxed("bg", &log))
            .expect("add");

        manager.pause().expect("pause");
        assert!(manager.is_paused());
        clock.advance(Duration::from_millis(500));
        manager.update().expect("paused update");
        assert!(log.borrow().is_empty());

        manager.resume().expect("resume");
        clock.advance(Duration::from_millis(16));
        manager.update().expect("update");
        assert!(!manager.is_paused());
        assert_eq!(*log.borrow(), vec!["update:bg:16"]);
    }

    #[test]
    fn is_paused_follows_state_paused_directly() {
        let (mut manager, _clock) = manager_with_clock();
        assert!(!manager.is_paused());
        manager.start(None);

        manager
            .current_state_mut()
            .expect("current")
            .pause()
            .expect("pause");
        assert!(manager.is_paused());

        manager
            .current_state_mut()
            .expect("current")
            .resume()
            .expect("resume");
        assert!(!manager.is_paused());

        manager.pause().expect("pause");
        manager
            .change_state(GameState::new("menu"), true)
            .expect("change");
        assert!(!manager.is_paused());
        assert!(manager.revert_to_previous_state().expect("revert"));
        assert!(!manager.is_paused());
    }

    #[test]
    fn sprite_mut_reaches_sprites_of_current_state() {
        let log = event_log();
        let (mut manager, _clock) = manager_with_clock();
        manager.start(None);
        let id = manager
            .add_enemy_sprite(TaggedSprite::boxed("slime", &log))
            .expect("add");

        let sprite = manager.sprite_mut(id).expect("started").expect("sprite");
        sprite.set_visible(false);

        assert!(!manager
            .sprite_mut(id)
            .expect("started")
            .expect("sprite")
            .is_visible());
    }

    #[test]
    fn shutdown_returns_to_unstarted() {
        let (mut manager, _clock) = manager_with_clock();
        manager.start(None);
        manager.change_state(GameState::new("b"), true).expect("b");

        manager.shutdown();

        assert!(!manager.is_started());
        assert!(!manager.has_previous_state());
        assert_eq!(manager.update(), Err(ManagerError::Uninitialized));
    }
}
