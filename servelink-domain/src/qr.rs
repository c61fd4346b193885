//! QR codes printed on tables. Scanning one opens the customer menu with the
//! table number in the query string.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::{render::svg, QrCode};
use url::Url;
use uuid::Uuid;

pub const TABLE_QUERY_PARAM: &str = "table";

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("cannot encode qr code: {0}")]
    Encode(#[from] qrcode::types::QrError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableQr {
    pub menu_url: String,
    pub data_url: String,
}

pub fn table_menu_url(
    base_url: &str,
    restaurant_id: Uuid,
    table_number: &str,
) -> Result<String, QrError> {
    let mut url = Url::parse(base_url).map_err(|e| QrError::InvalidBaseUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| QrError::InvalidBaseUrl(base_url.to_string()))?
        .pop_if_empty()
        .push("menu")
        .push(&restaurant_id.to_string());
    url.query_pairs_mut()
        .append_pair(TABLE_QUERY_PARAM, table_number);
    Ok(url.into())
}

/// Renders `payload` as an SVG QR code wrapped in a `data:` URL.
pub fn encode_data_url(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render()
        .min_dimensions(256, 256)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image.as_bytes())
    ))
}

pub fn table_qr(
    base_url: &str,
    restaurant_id: Uuid,
    table_number: &str,
) -> Result<TableQr, QrError> {
    let menu_url = table_menu_url(base_url, restaurant_id, table_number)?;
    let data_url = encode_data_url(&menu_url)?;
    Ok(TableQr { menu_url, data_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_url_carries_table_number() {
        let rid = Uuid::new_v4();
        let url = table_menu_url("https://servelink.example", rid, "12").unwrap();
        assert_eq!(url, format!("https://servelink.example/menu/{rid}?table=12"));
    }

    #[test]
    fn test_menu_url_keeps_base_path_and_escapes() {
        let rid = Uuid::new_v4();
        let url = table_menu_url("https://example.com/app/", rid, "A 1&2").unwrap();
        assert_eq!(
            url,
            format!("https://example.com/app/menu/{rid}?table=A+1%262")
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            table_menu_url("not a url", Uuid::new_v4(), "1"),
            Err(QrError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_data_url_is_svg() {
        let qr = table_qr("http://localhost:8080", Uuid::new_v4(), "7").unwrap();
        assert!(qr.data_url.starts_with("data:image/svg+xml;base64,"));
        let encoded = qr.data_url.trim_start_matches("data:image/svg+xml;base64,");
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }
}
