pub mod session_events;
