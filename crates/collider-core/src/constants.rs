pub const HASH_HEX_SIZE: usize = 64;
pub const CHUNK_SIZE: usize = 32;
pub const DISTANCE_SCALE: f64 = 1e15;

pub const TARGET_TIME_WINDOW: i64 = 8;
pub const ELAPSED_BONUS_OFFSET: i64 = 5;
pub const ADJUSTMENT_FLOOR: i64 = -99;
pub const DIFFICULTY_DIVISOR: u32 = 532;
pub const BOMB_PERIOD: u64 = 66_000_000;
pub const BOMB_GRACE_PERIODS: u64 = 2;
pub const BASE_MINIMUM_DIFFICULTY: u64 = 290_112_262_029_012;

pub const CHAIN_WEIGHT_MIN_HEIGHT: u64 = 2;
pub const CHAIN_WEIGHT_DIVISOR: u32 = 4;

pub const MAX_TIMEOUT_SECONDS: u64 = 300;
