//! # Playback
//!
//! The vendor playback SDK sits behind the [`PlaybackSdk`] / [`SdkPlayer`]
//! traits. [`PlaybackAdapter`] drives one player through its lifecycle,
//! mirrors its state into a `watch` channel and publishes classified errors
//! on a `broadcast` channel. [`ProgressPoller`] keeps the mirrored position
//! moving while a track plays.
//!
//! [`ConnectSdk`] is the implementation used by the command line: it drives
//! an existing Spotify Connect device through the Web API player endpoints.

pub mod adapter;
pub mod connect;
pub mod poller;
pub mod sdk;
pub mod state;

pub use adapter::{AdapterState, PlaybackAdapter, PlayerConfig};
pub use connect::{ConnectPlayer, ConnectSdk};
pub use poller::{POLL_INTERVAL, ProgressPoller};
pub use sdk::{
    EventKind, Listener, PlaybackSdk, PlayerOptions, ReadySignal, SdkEvent, SdkLoader,
    SdkPlaybackState, SdkPlayer, TokenProvider,
};
pub use state::{PlaybackDevice, PlaybackState, TrackRef};
