//! User-facing text for service error codes.

pub const GENERIC_FAILURE: &str = "processing failed, please retry";
pub const NETWORK_ERROR: &str = "network error, please check your connection";

pub fn hint_for_code(code: &str) -> Option<&'static str> {
    let text = match code.trim() {
        "1001" => "file upload failed, please retry",
        "1002" => "file not found, please upload again",
        "1003" => "file exceeds the size limit, please compress it and retry",
        "1004" => "invalid file format, please upload a zip, tar or tar.gz archive",
        "1005" => "failed to extract the archive, please check that it is intact",
        "1006" => "the archive contains no .md or .json files",
        "1008" => "download failed, please retry",
        "2001" => "the server could not create a directory, please contact the administrator",
        "2002" => "directory not found, please contact the administrator",
        "2003" => "directory access denied, please contact the administrator",
        "3001" => "file processing failed, please retry",
        "3002" => "file read error, please retry",
        "3003" => "file write error, please retry",
        "3004" => "text processing error, please retry",
        "3005" => "a JSON source file is not valid JSON",
        "4001" => "vectorization failed, please retry",
        "4002" => "model processing error, please retry",
        "4003" => "API call failed, please check the API configuration",
        "4004" => "invalid API key, please check it",
        "4005" => "configuration test failed, please check the model settings",
        "5001" => "internal system error, please contact the administrator",
        "5002" => "unexpected error, please contact the administrator",
        "6001" => "invalid parameter, please check your input",
        "6002" => "a required parameter is missing, please complete the form",
        "6003" => "parameter out of range, please adjust the value",
        "7001" => "task not found",
        "7002" => "the task was cancelled",
        "7003" => "the task has already finished",
        "7004" => "the task has already been cancelled",
        _ => return None,
    };
    Some(text)
}

/// Message shown for a failed call: server detail, then the table entry for
/// the code, then the server message, then a generic fallback.
pub fn resolve_message(detail: Option<&str>, code: Option<&str>, message: Option<&str>) -> String {
    fn non_blank(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|v| !v.is_empty())
    }
    if let Some(detail) = non_blank(detail) {
        return detail.to_string();
    }
    if let Some(hint) = non_blank(code).and_then(hint_for_code) {
        return hint.to_string();
    }
    if let Some(message) = non_blank(message) {
        return message.to_string();
    }
    GENERIC_FAILURE.to_string()
}
