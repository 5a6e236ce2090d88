/// Creator content
///
/// Owned records behind the APPROVED gate: channels and their stats
/// snapshots, teams, community discussions, tasks, and direct messages.
/// Reads require only a session; mutations go through the capability
/// table with the caller's fresh role and account state.
pub mod channels;
pub mod community;
pub mod messages;
pub mod tasks;
pub mod teams;

pub use channels::ChannelManager;
pub use community::CommunityManager;
pub use messages::MessageManager;
pub use tasks::TaskManager;
pub use teams::TeamManager;
