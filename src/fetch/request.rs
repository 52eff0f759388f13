use std::collections::HashMap;

use crate::error::AppError;
use crate::records::{RegionId, SystemId, TypeId};

use super::FetchResult;

/// The quick-look feed accepts at most this many `typeid` parameters per request.
pub const MARKETSTAT_BATCH_SIZE: usize = 100;

pub fn history_url(template: &str, region_id: RegionId, type_id: TypeId) -> FetchResult<String> {
    let replacements = HashMap::from([
        ("region", region_id.to_string()),
        ("type_id", type_id.to_string()),
    ]);
    render_template(template, &replacements)
}

pub fn orders_url(template: &str, region_id: RegionId, page: u32) -> FetchResult<String> {
    let replacements = HashMap::from([
        ("region", region_id.to_string()),
        ("page", page.to_string()),
    ]);
    render_template(template, &replacements)
}

/// Split the type list into quick-look URLs of at most [`MARKETSTAT_BATCH_SIZE`] ids each.
pub fn marketstat_urls(base: &str, type_ids: &[TypeId], system_id: SystemId) -> Vec<String> {
    let separator = if base.contains('?') { '&' } else { '?' };

    type_ids
        .chunks(MARKETSTAT_BATCH_SIZE)
        .map(|chunk| {
            let mut url = String::with_capacity(base.len() + chunk.len() * 16 + 24);
            url.push_str(base);
            url.push(separator);
            for type_id in chunk {
                url.push_str("typeid=");
                url.push_str(&type_id.to_string());
                url.push('&');
            }
            url.push_str("usesystem=");
            url.push_str(&system_id.to_string());
            url
        })
        .collect()
}

/// List the `{placeholder}` names used by a template, in order of appearance.
pub fn template_placeholders(template: &str) -> FetchResult<Vec<String>> {
    let mut keys = Vec::new();
    scan_template(template, |segment| {
        if let Segment::Placeholder(key) = segment {
            keys.push(key.to_string());
        }
        Ok(())
    })?;
    Ok(keys)
}

pub fn render_template(template: &str, replacements: &HashMap<&str, String>) -> FetchResult<String> {
    let mut result = String::with_capacity(template.len());
    scan_template(template, |segment| {
        match segment {
            Segment::Literal(ch) => result.push(ch),
            Segment::Placeholder(key) => {
                let value = replacements.get(key).ok_or_else(|| {
                    AppError::message(format!(
                        "No replacement provided for placeholder `{}` in template",
                        key
                    ))
                })?;
                result.push_str(value);
            }
        }
        Ok(())
    })?;
    Ok(result)
}

enum Segment<'a> {
    Literal(char),
    Placeholder(&'a str),
}

fn scan_template<'a, F>(template: &'a str, mut visit: F) -> FetchResult<()>
where
    F: FnMut(Segment<'a>) -> FetchResult<()>,
{
    let mut chars = template.char_indices();

    while let Some((start, ch)) = chars.next() {
        if ch != '{' {
            visit(Segment::Literal(ch))?;
            continue;
        }

        let mut end = None;
        for (idx, next) in chars.by_ref() {
            if next == '}' {
                end = Some(idx);
                break;
            }
        }

        let Some(end) = end else {
            return Err(AppError::message(format!(
                "Unterminated placeholder in template: {}",
                &template[start..]
            )));
        };

        let key = &template[start + 1..end];
        if key.is_empty() {
            return Err(AppError::message(
                "Encountered empty placeholder `{}` in template",
            ));
        }

        visit(Segment::Placeholder(key))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_history_url() {
        let url = history_url(
            "https://esi.test/markets/{region}/history/?type_id={type_id}",
            10000002,
            34,
        )
        .unwrap();
        assert_eq!(url, "https://esi.test/markets/10000002/history/?type_id=34");
    }

    #[test]
    fn renders_orders_page() {
        let url = orders_url("https://esi.test/markets/{region}/orders/?page={page}", 10000043, 3)
            .unwrap();
        assert_eq!(url, "https://esi.test/markets/10000043/orders/?page=3");
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = history_url("https://esi.test/{region}/{station}", 1, 2).unwrap_err();
        assert!(err.to_string().contains("`station`"));
    }

    #[test]
    fn empty_placeholder_is_rejected() {
        let err = template_placeholders("https://esi.test/{}/x").unwrap_err();
        assert!(err.to_string().contains("empty placeholder"));
    }

    #[test]
    fn lists_placeholders_in_order() {
        let keys = template_placeholders("a/{region}/b?p={page}").unwrap();
        assert_eq!(keys, vec!["region".to_string(), "page".to_string()]);
    }

    #[test]
    fn batches_marketstat_urls_by_hundred() {
        let type_ids: Vec<TypeId> = (1..=250).collect();
        let urls = marketstat_urls("https://stats.test/marketstat", &type_ids, 30000142);

        assert_eq!(urls.len(), 3);
        assert!(urls[0].starts_with("https://stats.test/marketstat?typeid=1&"));
        assert!(urls[0].ends_with("typeid=100&usesystem=30000142"));
        assert!(urls[2].contains("typeid=201&"));
        assert_eq!(urls[2].matches("typeid=").count(), 50);
    }

    #[test]
    fn marketstat_urls_respect_existing_query() {
        let urls = marketstat_urls("https://stats.test/api?format=xml", &[34], 30000142);
        assert_eq!(
            urls[0],
            "https://stats.test/api?format=xml&typeid=34&usesystem=30000142"
        );
    }
}
