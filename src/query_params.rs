// Filters and page number <-> URL query string, so searches are shareable links.

use std::collections::HashMap;
use url::form_urlencoded;

use crate::filters::{FilterSet, FilterValue, LIST_KEYS, SCALAR_KEYS};

pub const PAGE_KEY: &str = "page";

pub fn to_query_string(filters: &FilterSet, page: usize) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in filters.iter() {
        match value {
            FilterValue::List(values) => {
                for v in values {
                    serializer.append_pair(key, v);
                }
            }
            FilterValue::Scalar(v) => {
                serializer.append_pair(key, v);
            }
        }
    }
    if page > 1 {
        serializer.append_pair(PAGE_KEY, &page.to_string());
    }
    serializer.finish()
}

// Keys outside `skip` are read as filters; an invalid or missing page is 1.
pub fn parse_filters(query: &str, skip: &[&str]) -> (FilterSet, usize) {
    let mut page = 1;
    // Keep first-seen key order so repeated values stay in URL order
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == PAGE_KEY {
            page = value.trim().parse::<usize>().ok().filter(|p| *p >= 1).unwrap_or(1);
            continue;
        }
        if skip.contains(&&*key) {
            continue;
        }
        match index.get(&*key) {
            Some(&i) => grouped[i].1.push(value.into_owned()),
            None => {
                index.insert(key.to_string(), grouped.len());
                grouped.push((key.into_owned(), vec![value.into_owned()]));
            }
        }
    }

    let mut filters = FilterSet::new();
    for (key, mut values) in grouped {
        if LIST_KEYS.contains(&key.as_str()) {
            filters.set_list(key, values);
        } else if SCALAR_KEYS.contains(&key.as_str()) || values.len() == 1 {
            // Repeated scalar keys: the last one wins
            if let Some(last) = values.pop() {
                filters.set_scalar(key, last);
            }
        } else {
            filters.set_list(key, values);
        }
    }
    (filters, page)
}

pub fn parse_query_string(query: &str) -> (FilterSet, usize) {
    parse_filters(query, &[])
}

// Last value of a non-filter parameter such as `per_page`
pub fn param(query: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .last()
}
