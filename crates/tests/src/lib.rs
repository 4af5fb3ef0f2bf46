//! End-to-end tests driven against a real running `sfunet-api` instance,
//! mirroring the teacher's `TestApp`-per-test harness (worked
//! scenarios) but over the signaling WebSocket instead of REST, and with
//! no database: state lives in `AppState`/`RoomManager` for the lifetime of
//! one spawned server, torn down when the test's `TestApp` drops.

pub mod fixtures;

#[cfg(test)]
mod call_handshake_tests;
#[cfg(test)]
mod data_relay_tests;
#[cfg(test)]
mod reconnect_tests;
#[cfg(test)]
mod room_membership_tests;
#[cfg(test)]
mod track_replacement_tests;
