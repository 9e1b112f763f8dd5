// Declare the display submodule, shared with the subcommands
pub mod display;

// Declare the session submodule (containing the session_loop logic)
mod session;

// Declare the command_handlers module
mod command_handlers;

// Re-export the public function from the session submodule
pub use session::session_loop;
