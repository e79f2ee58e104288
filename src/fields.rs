// Structured logging field definitions
// This module centralizes all field names used in tracing logs

// Connection & Network fields
pub const PEER: &str = "peer";
pub const ROLE: &str = "role";
pub const PACKET_SIZE: &str = "packet_size";

// Player fields
pub const PLAYER_ID: &str = "player_id";
pub const PLAYER_INDEX: &str = "player_index";
pub const PLAYER_COUNT: &str = "player_count";

// Tick fields
pub const TICK: &str = "tick";
pub const LOCAL_TICK: &str = "local_tick";
pub const NEXT_TICK: &str = "next_tick";
pub const HORIZON: &str = "horizon";
pub const DELAY_TICKS: &str = "delay_ticks";

// Message fields
pub const RECORD_COUNT: &str = "record_count";
pub const INSERTED_COUNT: &str = "inserted_count";
pub const ACK_COUNT: &str = "ack_count";
pub const DRAINED_COUNT: &str = "drained_count";
pub const RECORD_SIZE: &str = "record_size";

// Ledger fields
pub const LEDGER_SIZE: &str = "ledger_size";
pub const PENDING_COUNT: &str = "pending_count";
pub const PRUNED_COUNT: &str = "pruned_count";

// Operation fields
pub const ERROR: &str = "error";
pub const REASON: &str = "reason";

// Server fields
pub const CONFIG_SOURCE: &str = "config_source";
pub const TICK_RATE_HZ: &str = "tick_rate_hz";

// Lag simulation fields
pub const DELAY_MS: &str = "delay_ms";
pub const QUEUE_SIZE: &str = "queue_size";
