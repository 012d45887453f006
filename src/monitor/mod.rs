//! Polling monitors, one per platform.
//!
//! Each monitor owns its in-memory last-seen state exclusively and runs an
//! endless tick loop: immediate first pass, then a fixed sleep. Guilds and
//! entities are walked sequentially within a tick, so a slow pass delays the
//! next one instead of overlapping it, and no mutation of runtime state ever
//! happens outside the owning task. The `check_specific_*` functions are the
//! manual-nudge variants: free functions over a client and local values, so
//! they cannot touch any monitor's cache.

mod tiktok;
mod twitch;
mod youtube;

pub use tiktok::{check_specific_accounts, TikTokMonitor};
pub use twitch::{check_specific_streamers, TwitchMonitor};
pub use youtube::{check_specific_channels, YouTubeMonitor};
