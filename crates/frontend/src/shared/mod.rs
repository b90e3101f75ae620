pub mod filter_panel;
pub mod filter_state;
