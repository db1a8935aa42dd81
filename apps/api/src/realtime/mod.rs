//! Real-time league synchronization over WebSocket.
//!
//! # Client -> Server
//!
//! ```json
//! {"type": "join_league", "league_id": "..."}
//! {"type": "leave_league", "league_id": "..."}
//! {"type": "auth", "token": "..."}
//! {"type": "ping"}
//! ```
//!
//! # Server -> Client
//!
//! ```json
//! {"type": "league_update", "league_id": "...", "updates": {...}, "version": 7}
//! {"type": "score_update", "league_id": "...", "user_id": "...", "new_score": "30", "version": 8}
//! ```

pub mod dispatcher;
pub mod handler;
pub mod messages;

pub use dispatcher::{Connection, SyncDispatcher};
pub use handler::websocket_handler;
pub use messages::{ClientMessage, ServerMessage, WsError};
