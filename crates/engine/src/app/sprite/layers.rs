use crate::app::rendering::Canvas;

use super::Sprite;

/// Paint buckets, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Background,
    MidgroundEnvironment,
    Enemies,
    Characters,
    Foreground,
}

const LAYER_COUNT: usize = 5;

impl Layer {
    /// Paint order.
    pub const ALL: [Layer; LAYER_COUNT] = [
        Layer::Background,
        Layer::MidgroundEnvironment,
        Layer::Enemies,
        Layer::Characters,
        Layer::Foreground,
    ];

    const fn index(self) -> usize {
        match self {
            Layer::Background => 0,
            Layer::MidgroundEnvironment => 1,
            Layer::Enemies => 2,
            Layer::Characters => 3,
            Layer::Foreground => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(pub u64);

struct SpriteEntry {
    id: SpriteId,
    sprite: Box<dyn Sprite>,
}

/// Owns the sprites of one game state and paints them layer by layer.
///
/// Render order: background fill, static background, then every layer in
/// [`Layer::ALL`] order, each in list order. Update order is the same minus
/// the fill.
pub struct SpriteManager {
    layers: [Vec<SpriteEntry>; LAYER_COUNT],
    static_background: Option<Box<dyn Sprite>>,
    background_fill: Option<[u8; 4]>,
    next_id: u64,
}

impl Default for SpriteManager {
    fn default() -> Self {
        Self {
            layers: Default::default(),
            static_background: None,
            background_fill: None,
            next_id: 1,
        }
    }
}

impl SpriteManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sprite(&mut self, sprite: Box<dyn Sprite>, layer: Layer) -> SpriteId {
        let id = self.allocate_id();
        self.layers[layer.index()].push(SpriteEntry { id, sprite });
        id
    }

    /// Puts the player at the front of the character layer so it updates
    /// and paints before every other character.
    pub fn add_player_character(&mut self, sprite: Box<dyn Sprite>) -> SpriteId {
        let id = self.allocate_id();
        self.layers[Layer::Characters.index()].insert(0, SpriteEntry { id, sprite });
        id
    }

    /// Background that does not pan with the world. It still updates, so it
    /// may animate. `None` removes it.
    pub fn set_static_background(&mut self, sprite: Option<Box<dyn Sprite>>) {
        self.static_background = sprite;
    }

    pub fn has_static_background(&self) -> bool {
        self.static_background.is_some()
    }

    /// Solid colour covering the whole canvas before anything else is drawn.
    pub fn set_background_fill(&mut self, color: Option<[u8; 4]>) {
        self.background_fill = color;
    }

    pub fn background_fill(&self) -> Option<[u8; 4]> {
        self.background_fill
    }

    pub fn render_list(&self, canvas: &mut dyn Canvas) {
        if let Some(color) = self.background_fill {
            canvas.clear(color);
        }
        if let Some(background) = &self.static_background {
            background.paint(canvas);
        }
        for layer in &self.layers {
            for entry in layer {
                entry.sprite.paint(canvas);
            }
        }
    }

    pub fn update_list(&mut self, dt_ms: f32) {
        if let Some(background) = &mut self.static_background {
            background.update(dt_ms);
        }
        for layer in &mut self.layers {
            for entry in layer.iter_mut() {
                entry.sprite.update(dt_ms);
            }
        }
    }

    pub fn get(&self, id: SpriteId) -> Option<&dyn Sprite> {
        self.find(id).map(|(layer, index)| {
            let entry = &self.layers[layer][index];
            entry.sprite.as_ref()
        })
    }

    pub fn get_mut(&mut self, id: SpriteId) -> Option<&mut (dyn Sprite + 'static)> {
        let (layer, index) = self.find(id)?;
        Some(self.layers[layer][index].sprite.as_mut())
    }

    pub fn layer_of(&self, id: SpriteId) -> Option<Layer> {
        self.find(id).map(|(layer, _)| Layer::ALL[layer])
    }

    pub fn remove(&mut self, id: SpriteId) -> Option<Box<dyn Sprite>> {
        let (layer, index) = self.find(id)?;
        Some(self.layers[layer].remove(index).sprite)
    }

    /// Ids of `layer` in update/paint order.
    pub fn layer_ids(&self, layer: Layer) -> Vec<SpriteId> {
        self.layers[layer.index()]
            .iter()
            .map(|entry| entry.id)
            .collect()
    }

    pub fn layer_len(&self, layer: Layer) -> usize {
        self.layers[layer.index()].len()
    }

    pub fn len(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Vec::is_empty)
    }

    pub fn clear_layer(&mut self, layer: Layer) {
        self.layers[layer.index()].clear();
    }

    /// Drops every layered sprite and the static background.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        self.static_background = None;
    }

    fn allocate_id(&mut self) -> SpriteId {
        let id = SpriteId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn find(&self, id: SpriteId) -> Option<(usize, usize)> {
        self.layers.iter().enumerate().find_map(|(layer, entries)| {
            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| (layer, index))
        })
    }
}
