//! Data-URL image parsing shared by both dialect transformers (spec.md §4.10)

use crate::upstream::InlineData;

/// Parse `data:<mime>;base64,<payload>`; for anything else, treat the whole
/// string as the payload and default the mime type to `image/png`.
pub fn parse_image_url(url: &str) -> InlineData {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((mime, payload)) = rest.split_once(";base64,") {
            return InlineData {
                mime_type: mime.to_string(),
                data: payload.to_string(),
            };
        }
    }
    InlineData {
        mime_type: "image/png".to_string(),
        data: url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_url() {
        let inline = parse_image_url("data:image/jpeg;base64,Zm9v");
        assert_eq!(inline.mime_type, "image/jpeg");
        assert_eq!(inline.data, "Zm9v");
    }

    #[test]
    fn falls_back_to_raw_url_with_default_mime() {
        let inline = parse_image_url("https://example.com/a.png");
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "https://example.com/a.png");
    }
}
