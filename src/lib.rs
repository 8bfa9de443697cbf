use rand::seq::SliceRandom;
use rand::thread_rng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use tsify::Tsify;
use wasm_bindgen::prelude::*;
use web_sys::console;

pub const GRID_SIZE: usize = 8;
pub const TRAY_SIZE: usize = 3;
pub const LINE_CLEAR_BASE_POINTS: u32 = 100;
pub const COMBO_BONUS_STEP: u32 = 50;
pub const HIGH_SCORE_KEY: &str = "block-blast-highscore";

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
}

fn log(msg: &str) {
    console::log_1(&JsValue::from_str(msg));
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Tsify)]
pub enum ShapeKind {
    Single,
    I2,
    I3,
    I4,
    I5,
    L2,
    L3,
    J3,
    T3,
    S2,
    Z2,
    O2,
    O3,
}

impl ShapeKind {
    pub fn all() -> [ShapeKind; 13] {
        [
            ShapeKind::Single,
            ShapeKind::I2,
            ShapeKind::I3,
            ShapeKind::I4,
            ShapeKind::I5,
            ShapeKind::L2,
            ShapeKind::L3,
            ShapeKind::J3,
            ShapeKind::T3,
            ShapeKind::S2,
            ShapeKind::Z2,
            ShapeKind::O2,
            ShapeKind::O3,
        ]
    }

    /// (rows, cols) of the shape's bounding box.
    pub fn size(self) -> (usize, usize) {
        match self {
            ShapeKind::Single => (1, 1),
            ShapeKind::I2 => (1, 2),
            ShapeKind::I3 => (1, 3),
            ShapeKind::I4 => (1, 4),
            ShapeKind::I5 => (1, 5),
            ShapeKind::L2 => (2, 2),
            ShapeKind::L3 => (3, 3),
            ShapeKind::J3 => (3, 3),
            ShapeKind::T3 => (2, 3),
            ShapeKind::S2 => (2, 3),
            ShapeKind::Z2 => (2, 3),
            ShapeKind::O2 => (2, 2),
            ShapeKind::O3 => (3, 3),
        }
    }

    /// Filled cells as (row, col) offsets from the shape origin.
    pub fn blocks(self) -> &'static [(usize, usize)] {
        match self {
            ShapeKind::Single => &[(0, 0)],
            ShapeKind::I2 => &[(0, 0), (0, 1)],
            ShapeKind::I3 => &[(0, 0), (0, 1), (0, 2)],
            ShapeKind::I4 => &[(0, 0), (0, 1), (0, 2), (0, 3)],
            ShapeKind::I5 => &[(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)],
            ShapeKind::L2 => &[(0, 0), (1, 0), (1, 1)],
            ShapeKind::L3 => &[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)],
            ShapeKind::J3 => &[(0, 2), (1, 2), (2, 0), (2, 1), (2, 2)],
            ShapeKind::T3 => &[(0, 0), (0, 1), (0, 2), (1, 1)],
            ShapeKind::S2 => &[(0, 1), (0, 2), (1, 0), (1, 1)],
            ShapeKind::Z2 => &[(0, 0), (0, 1), (1, 1), (1, 2)],
            ShapeKind::O2 => &[(0, 0), (0, 1), (1, 0), (1, 1)],
            ShapeKind::O3 => &[
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 0),
                (1, 1),
                (1, 2),
                (2, 0),
                (2, 1),
                (2, 2),
            ],
        }
    }

    pub fn cell_count(self) -> u32 {
        self.blocks().len() as u32
    }
}

/// Render palette; cell values 1..=7 index into this, 0 is empty.
pub const COLORS: [&str; 7] = [
    "#FF5252", // red
    "#448AFF", // blue
    "#4CAF50", // green
    "#FFEB3B", // yellow
    "#E040FB", // purple
    "#FF9800", // orange
    "#00BCD4", // cyan
];

#[derive(Clone, Serialize, Deserialize, Debug, Tsify)]
pub enum PieceSourceKind {
    TrueRandom,
    SingleShape { kind: ShapeKind },
}

impl Default for PieceSourceKind {
    fn default() -> Self {
        PieceSourceKind::TrueRandom
    }
}

pub trait PieceSource {
    /// Draw a shape and a color id for the next piece.
    fn draw(&mut self) -> (ShapeKind, u8);
}

pub struct TrueRandom;

impl PieceSource for TrueRandom {
    fn draw(&mut self) -> (ShapeKind, u8) {
        let mut rng = thread_rng();
        let kind = *ShapeKind::all().choose(&mut rng).unwrap();
        let color = rng.gen_range(1..=COLORS.len() as u8);
        (kind, color)
    }
}

pub struct SingleShape {
    pub kind: ShapeKind,
}

impl PieceSource for SingleShape {
    fn draw(&mut self) -> (ShapeKind, u8) {
        let color = thread_rng().gen_range(1..=COLORS.len() as u8);
        (self.kind, color)
    }
}

fn source_from_kind(kind: PieceSourceKind) -> Box<dyn PieceSource> {
    match kind {
        PieceSourceKind::TrueRandom => Box::new(TrueRandom),
        PieceSourceKind::SingleShape { kind } => Box::new(SingleShape { kind }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    pub id: u32,
    pub kind: ShapeKind,
    pub color: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[0; GRID_SIZE]; GRID_SIZE],
        }
    }

    pub fn cell(&self, x: usize, y: usize) -> u8 {
        self.cells[y][x]
    }

    /// Fails closed: an out-of-bounds or occupied target cell reports "not
    /// placeable" rather than an error.
    pub fn can_place(&self, kind: ShapeKind, x: i32, y: i32) -> bool {
        for &(sy, sx) in kind.blocks() {
            let bx = x + sx as i32;
            let by = y + sy as i32;
            if bx < 0 || bx >= GRID_SIZE as i32 || by < 0 || by >= GRID_SIZE as i32 {
                return false;
            }
            if self.cells[by as usize][bx as usize] != 0 {
                return false;
            }
        }
        true
    }

    /// Writes `color` into every covered cell and returns the count written.
    /// Callers must have checked `can_place`; this does not re-validate.
    pub fn place(&mut self, kind: ShapeKind, color: u8, x: i32, y: i32) -> u32 {
        let mut written = 0;
        for &(sy, sx) in kind.blocks() {
            self.cells[(y + sy as i32) as usize][(x + sx as i32) as usize] = color;
            written += 1;
        }
        written
    }

    /// Fully occupied rows and columns, both axes judged independently in
    /// the same pass. A cell may count toward its row and its column at once.
    pub fn completed_lines(&self) -> (Vec<usize>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        for i in 0..GRID_SIZE {
            if self.cells[i].iter().all(|&c| c != 0) {
                rows.push(i);
            }
            if self.cells.iter().all(|row| row[i] != 0) {
                cols.push(i);
            }
        }
        (rows, cols)
    }

    pub fn clear_lines(&mut self, rows: &[usize], cols: &[usize]) {
        for &r in rows {
            self.cells[r] = [0; GRID_SIZE];
        }
        for &c in cols {
            for row in self.cells.iter_mut() {
                row[c] = 0;
            }
        }
    }

    fn fits_anywhere(&self, kind: ShapeKind) -> bool {
        let (rows, cols) = kind.size();
        for y in 0..=(GRID_SIZE - rows) {
            for x in 0..=(GRID_SIZE - cols) {
                if self.can_place(kind, x as i32, y as i32) {
                    return true;
                }
            }
        }
        false
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// True iff no piece in the tray fits at any board origin. An empty tray is
/// a transient replenishment state and reports "not over".
pub fn tray_fits_nowhere(board: &Board, pieces: &[Piece]) -> bool {
    if pieces.is_empty() {
        return false;
    }
    pieces.iter().all(|p| !board.fits_anywhere(p.kind))
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Tsify)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    StartMenu,
    Playing,
    Paused,
    GameOver,
}

#[derive(Clone, Copy, Serialize, Debug, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct DragPreview {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub valid: bool,
}

struct DragState {
    index: usize,
    preview: Option<(i32, i32, bool)>,
}

#[derive(Clone, Serialize, Debug, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResult {
    pub piece_id: u32,
    pub cells_placed: u32,
    pub cleared_rows: Vec<usize>,
    pub cleared_cols: Vec<usize>,
    pub score_delta: u32,
    pub combo: u32,
    pub game_over: bool,
}

pub trait HighScoreStore {
    fn load(&self) -> u32;
    fn save(&self, value: u32);
}

/// Browser store under a fixed localStorage key. Missing or corrupt values
/// degrade to zero; write failures are ignored.
pub struct LocalStorage;

impl HighScoreStore for LocalStorage {
    fn load(&self) -> u32 {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .and_then(|s| s.get_item(HIGH_SCORE_KEY).ok().flatten())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    fn save(&self, value: u32) {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.set_item(HIGH_SCORE_KEY, &value.to_string());
        }
    }
}

/// Store for headless embeddings and tests.
#[derive(Default)]
pub struct MemoryStore {
    value: std::cell::Cell<u32>,
}

impl MemoryStore {
    pub fn with_value(value: u32) -> Self {
        Self {
            value: std::cell::Cell::new(value),
        }
    }
}

impl HighScoreStore for MemoryStore {
    fn load(&self) -> u32 {
        self.value.get()
    }

    fn save(&self, value: u32) {
        self.value.set(value);
    }
}

pub struct Game {
    board: Board,
    tray: Vec<Piece>,
    score: u32,
    combo: u32,
    high_score: u32,
    state: GameState,
    source: Box<dyn PieceSource>,
    store: Box<dyn HighScoreStore>,
    next_piece_id: u32,
    drag: Option<DragState>,
}

impl Game {
    pub fn new(source: Box<dyn PieceSource>, store: Box<dyn HighScoreStore>) -> Self {
        let high_score = store.load();
        Self {
            board: Board::new(),
            tray: Vec::new(),
            score: 0,
            combo: 0,
            high_score,
            state: GameState::StartMenu,
            source,
            store,
            next_piece_id: 1,
            drag: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn tray(&self) -> &[Piece] {
        &self.tray
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    fn fresh_piece(&mut self) -> Piece {
        let (kind, color) = self.source.draw();
        let id = self.next_piece_id;
        self.next_piece_id += 1;
        Piece { id, kind, color }
    }

    /// Refills only from empty; the tray is never topped up piecewise.
    fn refill_tray(&mut self) {
        while self.tray.len() < TRAY_SIZE {
            let piece = self.fresh_piece();
            self.tray.push(piece);
        }
    }

    pub fn start(&mut self) {
        self.board = Board::new();
        self.score = 0;
        self.combo = 0;
        self.tray.clear();
        self.refill_tray();
        self.drag = None;
        self.state = GameState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == GameState::Playing {
            self.state = GameState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == GameState::Paused {
            self.state = GameState::Playing;
        }
    }

    pub fn reset_to_menu(&mut self) {
        if matches!(self.state, GameState::Paused | GameState::GameOver) {
            self.state = GameState::StartMenu;
            self.drag = None;
        }
    }

    /// Commits a piece at a board origin. Returns None without touching the
    /// board when the game is not active, the index is stale, or the piece
    /// does not fit.
    pub fn place_piece(&mut self, index: usize, x: i32, y: i32) -> Option<PlacementResult> {
        if self.state != GameState::Playing {
            return None;
        }
        let piece = *self.tray.get(index)?;
        if !self.board.can_place(piece.kind, x, y) {
            return None;
        }

        let cells_placed = self.board.place(piece.kind, piece.color, x, y);
        let (cleared_rows, cleared_cols) = self.board.completed_lines();
        let lines_cleared = (cleared_rows.len() + cleared_cols.len()) as u32;

        let mut score_delta = cells_placed;
        if lines_cleared > 0 {
            self.combo += 1;
            score_delta += LINE_CLEAR_BASE_POINTS * lines_cleared * lines_cleared
                + self.combo * COMBO_BONUS_STEP;
            self.board.clear_lines(&cleared_rows, &cleared_cols);
        } else {
            self.combo = 0;
        }
        self.score += score_delta;
        if self.score > self.high_score {
            self.high_score = self.score;
            self.store.save(self.high_score);
        }

        self.tray.remove(index);
        if self.tray.is_empty() {
            self.refill_tray();
        }
        let game_over = tray_fits_nowhere(&self.board, &self.tray);
        if game_over {
            self.state = GameState::GameOver;
        }

        Some(PlacementResult {
            piece_id: piece.id,
            cells_placed,
            cleared_rows,
            cleared_cols,
            score_delta,
            combo: self.combo,
            game_over,
        })
    }

    pub fn begin_drag(&mut self, index: usize) -> bool {
        if self.state != GameState::Playing || index >= self.tray.len() {
            return false;
        }
        self.drag = Some(DragState {
            index,
            preview: None,
        });
        true
    }

    /// Records the latest candidate origin in grid coordinates. The preview
    /// is kept even when invalid so the UI can ghost a rejected position.
    pub fn update_drag(&mut self, x: i32, y: i32) -> Option<DragPreview> {
        let drag = self.drag.as_mut()?;
        let piece = self.tray[drag.index];
        let valid = self.board.can_place(piece.kind, x, y);
        drag.preview = Some((x, y, valid));
        Some(DragPreview {
            index: drag.index,
            x,
            y,
            valid,
        })
    }

    /// Commits the drag if its last candidate was valid; otherwise the drag
    /// is abandoned and the board is left untouched.
    pub fn end_drag(&mut self) -> Option<PlacementResult> {
        let drag = self.drag.take()?;
        let (x, y, valid) = drag.preview?;
        if !valid {
            return None;
        }
        self.place_piece(drag.index, x, y)
    }

    pub fn snapshot(&self) -> GameView {
        let mut board = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                board.push(self.board.cell(x, y));
            }
        }
        let pieces = self
            .tray
            .iter()
            .map(|p| {
                let (rows, cols) = p.kind.size();
                PieceView {
                    id: p.id,
                    kind: p.kind,
                    color: p.color,
                    rows,
                    cols,
                    blocks: p
                        .kind
                        .blocks()
                        .iter()
                        .map(|&(sy, sx)| BlockPos {
                            x: sx as u8,
                            y: sy as u8,
                        })
                        .collect(),
                }
            })
            .collect();
        let preview = self.drag.as_ref().and_then(|d| {
            d.preview.map(|(x, y, valid)| DragPreview {
                index: d.index,
                x,
                y,
                valid,
            })
        });
        GameView {
            board,
            pieces,
            score: self.score,
            combo: self.combo,
            high_score: self.high_score,
            state: self.state,
            preview,
        }
    }
}

#[derive(Clone, Copy, Serialize, Debug, Tsify)]
pub struct BlockPos {
    pub x: u8,
    pub y: u8,
}

#[derive(Clone, Serialize, Debug, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct PieceView {
    pub id: u32,
    pub kind: ShapeKind,
    pub color: u8,
    pub rows: usize,
    pub cols: usize,
    pub blocks: Vec<BlockPos>,
}

#[derive(Clone, Serialize, Debug, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    /// Row-major GRID_SIZE x GRID_SIZE cells; 0 empty, 1..=7 palette index.
    pub board: Vec<u8>,
    pub pieces: Vec<PieceView>,
    pub score: u32,
    pub combo: u32,
    pub high_score: u32,
    pub state: GameState,
    pub preview: Option<DragPreview>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    pub piece_source: PieceSourceKind,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            piece_source: PieceSourceKind::default(),
        }
    }
}


#[wasm_bindgen]
pub struct GameClient {
    game: Game,
}

#[wasm_bindgen]
impl GameClient {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<GameClient, JsValue> {
        let options: ClientOptions = from_value(options).unwrap_or_default();
        let game = Game::new(
            source_from_kind(options.piece_source),
            Box::new(LocalStorage),
        );
        Ok(Self { game })
    }

    #[wasm_bindgen(js_name = startGame)]
    pub fn start_game(&mut self) -> Result<JsValue, JsValue> {
        self.game.start();
        self.view()
    }

    #[wasm_bindgen(js_name = pauseGame)]
    pub fn pause_game(&mut self) -> Result<JsValue, JsValue> {
        self.game.pause();
        self.view()
    }

    #[wasm_bindgen(js_name = resumeGame)]
    pub fn resume_game(&mut self) -> Result<JsValue, JsValue> {
        self.game.resume();
        self.view()
    }

    #[wasm_bindgen(js_name = resetToMenu)]
    pub fn reset_to_menu(&mut self) -> Result<JsValue, JsValue> {
        self.game.reset_to_menu();
        self.view()
    }

    #[wasm_bindgen(js_name = beginDrag)]
    pub fn begin_drag(&mut self, index: usize) -> bool {
        self.game.begin_drag(index)
    }

    /// Candidate origin in grid cells; pixel mapping stays in the UI layer.
    #[wasm_bindgen(js_name = updateDrag)]
    pub fn update_drag(&mut self, x: i32, y: i32) -> Result<JsValue, JsValue> {
        to_value(&self.game.update_drag(x, y)).map_err(|e| e.into())
    }

    #[wasm_bindgen(js_name = endDrag)]
    pub fn end_drag(&mut self) -> Result<JsValue, JsValue> {
        let result = self.game.end_drag();
        if let Some(placement) = &result {
            if placement.game_over {
                log("game over: no remaining piece fits");
            }
        }
        to_value(&result).map_err(|e| e.into())
    }

    #[wasm_bindgen(js_name = snapshot)]
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        self.view()
    }

    #[wasm_bindgen(js_name = snapshotJson)]
    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.game.snapshot()).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl GameClient {
    fn view(&self) -> Result<JsValue, JsValue> {
        to_value(&self.game.snapshot()).map_err(|e| e.into())
    }
}

#[wasm_bindgen(js_name = colorPalette)]
pub fn color_palette() -> js_sys::Array {
    COLORS.iter().map(|c| JsValue::from_str(c)).collect()
}
