//! Endpoint paths, multipart field names and the recording allow-list.

/// Upload endpoint, relative to the server base URL.
pub const CALL_RECORDS_PATH: &str = "/call_records";

/// Login endpoint, relative to the server base URL.
pub const LOGIN_PATH: &str = "/login";

/// Multipart field carrying the call timestamp.
pub const FIELD_CALL_TIMESTAMP: &str = "call_timestamp";

/// Multipart field carrying the bare file name.
pub const FIELD_FILENAME: &str = "filename";

/// Multipart field carrying the audio bytes.
pub const FIELD_AUDIO_FILE: &str = "audio_file";

/// Content type sent with the `audio_file` part.
pub const AUDIO_CONTENT_TYPE: &str = "audio/*";

/// Lower-case file extensions eligible for upload.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "3gp", "amr", "m4a"];

/// Format of `call_timestamp`. The trailing `Z` is literal: the backend
/// receives local time in a fixed UTC-6 offset with a UTC marker.
pub const CALL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Offset applied to file modification times, in seconds east of UTC.
pub const CALL_TIMESTAMP_OFFSET_SECS: i32 = -6 * 3600;
