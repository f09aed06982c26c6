pub mod games;
pub mod sync;

pub use games::{list_games, print_games, GameEntry};
pub use sync::{print_report, print_summary, sync_all_games, sync_game, RunSummary};
