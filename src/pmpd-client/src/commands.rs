//! Command names and the decoding strategy each one's reply needs.

use crate::response::DecodeStrategy;

pub const ADD: &str = "add";
pub const CLEAR: &str = "clear";
pub const CLEAR_ERROR: &str = "clearerror";
pub const CLOSE: &str = "close";
pub const CONSUME: &str = "consume";
pub const CROSSFADE: &str = "crossfade";
pub const CURRENT_SONG: &str = "currentsong";
pub const DELETE: &str = "delete";
pub const DELETE_ID: &str = "deleteid";
pub const DISABLE_OUTPUT: &str = "disableoutput";
pub const ENABLE_OUTPUT: &str = "enableoutput";
pub const FIND: &str = "find";
pub const LIST: &str = "list";
pub const LIST_ALL: &str = "listall";
pub const LIST_PLAYLIST: &str = "listplaylist";
pub const LIST_PLAYLIST_INFO: &str = "listplaylistinfo";
pub const LIST_PLAYLISTS: &str = "listplaylists";
pub const LOAD: &str = "load";
pub const LS_INFO: &str = "lsinfo";
pub const MOVE: &str = "move";
pub const NEXT: &str = "next";
pub const OUTPUTS: &str = "outputs";
pub const PASSWORD: &str = "password";
pub const PAUSE: &str = "pause";
pub const PING: &str = "ping";
pub const PLAY: &str = "play";
pub const PLAY_ID: &str = "playid";
pub const PLAYLIST_FIND: &str = "playlistfind";
pub const PLAYLIST_ID: &str = "playlistid";
pub const PLAYLIST_INFO: &str = "playlistinfo";
pub const PLAYLIST_SEARCH: &str = "playlistsearch";
pub const PL_CHANGES: &str = "plchanges";
pub const PREVIOUS: &str = "previous";
pub const RANDOM: &str = "random";
pub const REPEAT: &str = "repeat";
pub const RM: &str = "rm";
pub const SAVE: &str = "save";
pub const SEARCH: &str = "search";
pub const SEEK: &str = "seek";
pub const SEEK_CUR: &str = "seekcur";
pub const SET_VOL: &str = "setvol";
pub const SHUFFLE: &str = "shuffle";
pub const SINGLE: &str = "single";
pub const STATS: &str = "stats";
pub const STATUS: &str = "status";
pub const STOP: &str = "stop";
pub const UPDATE: &str = "update";

/// Every command name above, sorted.
pub const ALL: &[&str] = &[
    ADD,
    CLEAR,
    CLEAR_ERROR,
    CLOSE,
    CONSUME,
    CROSSFADE,
    CURRENT_SONG,
    DELETE,
    DELETE_ID,
    DISABLE_OUTPUT,
    ENABLE_OUTPUT,
    FIND,
    LIST,
    LIST_ALL,
    LIST_PLAYLIST,
    LIST_PLAYLIST_INFO,
    LIST_PLAYLISTS,
    LOAD,
    LS_INFO,
    MOVE,
    NEXT,
    OUTPUTS,
    PASSWORD,
    PAUSE,
    PING,
    PLAY,
    PLAY_ID,
    PLAYLIST_FIND,
    PLAYLIST_ID,
    PLAYLIST_INFO,
    PLAYLIST_SEARCH,
    PL_CHANGES,
    PREVIOUS,
    RANDOM,
    REPEAT,
    RM,
    SAVE,
    SEARCH,
    SEEK,
    SEEK_CUR,
    SET_VOL,
    SHUFFLE,
    SINGLE,
    STATS,
    STATUS,
    STOP,
    UPDATE,
];

pub fn is_known(command: &str) -> bool {
    ALL.binary_search(&command).is_ok()
}

/// Grouping for a command's reply. Song listings split on `file`; anything
/// not listed decodes as flat fields.
pub fn strategy_for(command: &str) -> DecodeStrategy {
    match command {
        LIST_PLAYLIST_INFO | PLAYLIST_INFO | PLAYLIST_ID | PLAYLIST_FIND | PLAYLIST_SEARCH
        | FIND | SEARCH | PL_CHANGES => DecodeStrategy::Records { split_key: "file" },
        OUTPUTS => DecodeStrategy::Records {
            split_key: "outputid",
        },
        LIST_PLAYLISTS => DecodeStrategy::Records {
            split_key: "playlist",
        },
        _ => DecodeStrategy::Fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_sorted_and_unique() {
        let mut sorted = ALL.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, ALL);
    }

    #[test]
    fn lookup_known_commands() {
        assert!(is_known("listplaylistinfo"));
        assert!(is_known(PASSWORD));
        assert!(!is_known("frobnicate"));
    }

    #[test]
    fn song_listings_group_by_file() {
        assert_eq!(
            strategy_for(LIST_PLAYLIST_INFO),
            DecodeStrategy::Records { split_key: "file" }
        );
        assert_eq!(
            strategy_for(PLAYLIST_INFO),
            DecodeStrategy::Records { split_key: "file" }
        );
        assert_eq!(
            strategy_for(OUTPUTS),
            DecodeStrategy::Records {
                split_key: "outputid"
            }
        );
    }

    #[test]
    fn everything_else_is_flat() {
        assert_eq!(strategy_for(STATUS), DecodeStrategy::Fields);
        assert_eq!(strategy_for(CURRENT_SONG), DecodeStrategy::Fields);
        assert_eq!(strategy_for("unknown"), DecodeStrategy::Fields);
    }
}
