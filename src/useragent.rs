use woothee::parser::Parser;

/// Browser / OS / device category derived from a User-Agent header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UaDetails {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
}

/// Parse a User-Agent string with woothee. Unknown fields come back as `None`.
pub fn parse(ua: Option<&str>) -> UaDetails {
    let ua = match ua {
        Some(s) if !s.is_empty() => s,
        _ => return UaDetails::default(),
    };

    let parser = Parser::new();
    match parser.parse(ua) {
        Some(result) => UaDetails {
            browser: known(result.name),
            os: known(result.os),
            device_type: known(result.category),
        },
        None => UaDetails::default(),
    }
}

fn known(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_owned())
    }
}
