pub mod call;
pub mod error;
pub mod ids;
pub mod participant;
pub mod protocol;
pub mod room;
pub mod session;
pub mod track;

pub use call::{Call, CallState};
pub use error::{DomainError, DomainResult, ErrorKind, OpOutcome};
pub use ids::{CallId, ParticipantSid, RoomSid, SequentialSidGenerator, SidGenerator, TrackSid, UuidSidGenerator};
pub use participant::{ConnectionState, Participant, Permissions};
pub use protocol::{CallView, ClientIntent, DataKind, ErrorFrame, ParticipantView, ServerEvent};
pub use room::{Room, is_valid_room_name};
pub use session::{Session, SessionEvent, SessionState};
pub use track::{Track, TrackKind, TrackSource};
