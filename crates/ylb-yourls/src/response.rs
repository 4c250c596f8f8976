//! Decoding of YOURLS API replies.
//!
//! YOURLS is loose with types: status codes arrive as numbers or strings, and
//! an empty listing is `[]` instead of `{}`. Everything here works on
//! `serde_json::Value` for that reason.

use serde_json::Value;

use ylb_core::{
    domain::{CreatedLink, ShortUrl},
    errors::Error,
    utils::extract_keyword,
    Result,
};

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Numeric status from `errorCode` / `statusCode`, whatever its JSON type.
fn code_field(v: &Value, key: &str) -> Option<u16> {
    match v.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn message(v: &Value) -> String {
    str_field(v, "message").unwrap_or("no message").to_string()
}

fn is_not_found(v: &Value) -> bool {
    code_field(v, "errorCode") == Some(404) || code_field(v, "statusCode") == Some(404)
}

fn is_failure(v: &Value) -> bool {
    if str_field(v, "status") == Some("fail") {
        return true;
    }
    if v.get("errorCode").is_some() {
        return true;
    }
    matches!(code_field(v, "statusCode"), Some(code) if code >= 400)
}

/// Failure common to every action, or `Ok(())` when the reply reports success.
fn check(v: &Value, subject: &str) -> Result<()> {
    if !is_failure(v) {
        return Ok(());
    }
    if is_not_found(v) {
        return Err(Error::NotFound(subject.to_string()));
    }
    Err(Error::Transport(format!("yourls api error: {}", message(v))))
}

/// `action=shorturl`
pub fn parse_created(v: &Value, requested_keyword: Option<&str>) -> Result<CreatedLink> {
    match str_field(v, "code") {
        Some("error:keyword") => {
            return Err(Error::KeywordExists(
                requested_keyword.unwrap_or_default().to_string(),
            ))
        }
        Some("error:nourl") => return Err(Error::InvalidUrl(message(v))),
        _ => {}
    }

    // `error:url`: the instance only allows one short link per URL and hands
    // back the existing one.
    let reused = str_field(v, "code") == Some("error:url");
    if !reused {
        check(v, requested_keyword.unwrap_or_default())?;
    }

    let short_url = str_field(v, "shorturl")
        .ok_or_else(|| Error::InvalidUrl(message(v)))?
        .to_string();
    let record = v.get("url").unwrap_or(&Value::Null);
    let keyword = str_field(record, "keyword")
        .map(str::to_string)
        .unwrap_or_else(|| extract_keyword(&short_url));
    let title = str_field(v, "title")
        .or_else(|| str_field(record, "title"))
        .unwrap_or_default()
        .to_string();

    Ok(CreatedLink {
        keyword,
        short_url,
        title,
        reused,
    })
}

/// `action=expand`
pub fn parse_expanded(v: &Value, keyword: &str) -> Result<String> {
    check(v, keyword)?;
    str_field(v, "longurl")
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound(keyword.to_string()))
}

/// `action=stats`
pub fn parse_listing(v: &Value) -> Result<Vec<ShortUrl>> {
    check(v, "stats")?;
    let Some(Value::Object(links)) = v.get("links") else {
        // An empty listing comes back as `[]` or not at all.
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(links.len());
    for link in links.values() {
        let Some(short_url) = str_field(link, "shorturl") else {
            continue;
        };
        out.push(ShortUrl {
            keyword: extract_keyword(short_url),
            short_url: short_url.to_string(),
            url: str_field(link, "url").unwrap_or_default().to_string(),
            title: str_field(link, "title").unwrap_or_default().to_string(),
        });
    }
    Ok(out)
}

/// `action=delete`, `action=update`
pub fn parse_ack(v: &Value, keyword: &str) -> Result<()> {
    check(v, keyword)
}

/// `action=change_keyword`
pub fn parse_renamed(v: &Value, old_keyword: &str, new_keyword: &str) -> Result<()> {
    if !is_failure(v) {
        return Ok(());
    }
    if is_not_found(v) {
        return Err(Error::NotFound(old_keyword.to_string()));
    }
    let msg = message(v).to_lowercase();
    if msg.contains("exist") || msg.contains("taken") || msg.contains("reserved") {
        return Err(Error::KeywordExists(new_keyword.to_string()));
    }
    Err(Error::Transport(format!("yourls api error: {}", message(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_link_from_shorturl_reply() {
        let v = json!({
            "url": {"keyword": "abc", "url": "https://example.com", "title": "Example", "date": "2024-01-01", "ip": "127.0.0.1"},
            "status": "success",
            "message": "https://example.com added to database",
            "title": "Example",
            "shorturl": "https://sho.rt/abc",
            "statusCode": 200
        });
        let link = parse_created(&v, None).unwrap();
        assert_eq!(link.keyword, "abc");
        assert_eq!(link.short_url, "https://sho.rt/abc");
        assert_eq!(link.title, "Example");
        assert!(!link.reused);
    }

    #[test]
    fn occupied_keyword_and_missing_url_are_typed() {
        let v = json!({"status": "fail", "code": "error:keyword", "message": "Short URL abc already exists in database or is reserved", "statusCode": 200});
        assert!(matches!(
            parse_created(&v, Some("abc")),
            Err(Error::KeywordExists(k)) if k == "abc"
        ));

        let v = json!({"status": "fail", "code": "error:nourl", "message": "Missing or malformed URL", "errorCode": "400"});
        assert!(matches!(parse_created(&v, None), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn duplicate_url_hands_back_existing_link() {
        let v = json!({
            "status": "fail",
            "code": "error:url",
            "url": {"keyword": "old", "url": "https://example.com", "title": "Example"},
            "message": "https://example.com already exists in database",
            "title": "Example",
            "shorturl": "https://sho.rt/old",
            "statusCode": 200
        });
        let link = parse_created(&v, Some("new")).unwrap();
        assert_eq!(link.keyword, "old");
        assert!(link.reused);
    }

    #[test]
    fn expand_not_found_with_string_or_number_codes() {
        let ok = json!({"keyword": "abc", "shorturl": "https://sho.rt/abc", "longurl": "https://example.com", "title": "Example", "message": "success", "statusCode": 200});
        assert_eq!(parse_expanded(&ok, "abc").unwrap(), "https://example.com");

        let missing = json!({"keyword": "nope", "message": "Error: short URL not found", "errorCode": "404"});
        assert!(matches!(parse_expanded(&missing, "nope"), Err(Error::NotFound(_))));

        let missing = json!({"message": "Error: short URL not found", "errorCode": 404, "statusCode": 404});
        assert!(matches!(parse_expanded(&missing, "nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn listing_derives_keywords_and_tolerates_empty_array() {
        let v = json!({
            "links": {
                "link_1": {"shorturl": "https://sho.rt/abc", "url": "https://a.com", "title": "A", "timestamp": "2024-01-01 10:00:00", "ip": "1.1.1.1", "clicks": "3"},
                "link_2": {"shorturl": "https://sho.rt/xyz/", "url": "https://b.com", "title": "B", "timestamp": "2024-01-01 10:00:00", "ip": "1.1.1.1", "clicks": "0"}
            },
            "stats": {"total_links": "2", "total_clicks": "3"},
            "statusCode": 200,
            "message": "success"
        });
        let listing = parse_listing(&v).unwrap();
        let keywords: Vec<_> = listing.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["abc", "xyz"]);

        let empty = json!({"links": [], "statusCode": 200, "message": "success"});
        assert!(parse_listing(&empty).unwrap().is_empty());
    }

    #[test]
    fn plugin_replies() {
        let ok = json!({"statusCode": 200, "message": "success: deleted"});
        assert!(parse_ack(&ok, "abc").is_ok());

        let missing = json!({"errorCode": 404, "message": "error: not found"});
        assert!(matches!(parse_ack(&missing, "abc"), Err(Error::NotFound(_))));

        let taken = json!({"statusCode": 400, "message": "error: keyword already exists"});
        assert!(matches!(
            parse_renamed(&taken, "old", "new"),
            Err(Error::KeywordExists(k)) if k == "new"
        ));

        let denied = json!({"errorCode": 403, "message": "Please log in"});
        assert!(matches!(parse_ack(&denied, "abc"), Err(Error::Transport(_))));
    }
}
