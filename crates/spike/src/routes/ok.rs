// Health check.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub fn handle_ok() -> OkResponse {
    OkResponse { ok: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let json = serde_json::to_string(&handle_ok()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }
}
