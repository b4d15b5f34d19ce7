pub mod command_loop;
pub mod parse;
