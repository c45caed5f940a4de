//! Deterministic names for generated types, fields and operations
//!
//! Every name is derived from a namespace path, e.g. `["post", "seo"]`
//! becomes `PostSeo`.

/// Names used by the static part of the schema
pub const BUILTIN_TYPES: &[&str] = &[
    "Query",
    "Mutation",
    "Reference",
    "JSON",
    "String",
    "Float",
    "Int",
    "Boolean",
    "ID",
    "SystemInfo",
    "PageInfo",
    "Node",
    "Document",
    "Connection",
    "Collection",
    "DocumentNode",
    "DocumentConnection",
    "DocumentConnectionEdges",
    "DocumentMutation",
    "StringFilter",
    "NumberFilter",
    "DatetimeFilter",
    "BooleanFilter",
    "ImageFilter",
    "RichTextFilter",
];

/// `blog-post` → `BlogPost`, `seo_meta` → `SeoMeta`, `releaseDate` → `ReleaseDate`
pub fn pascal_case(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

pub fn type_name(namespace: &[String]) -> String {
    namespace.iter().map(|s| pascal_case(s)).collect()
}

pub fn document_type_name(namespace: &[String]) -> String {
    format!("{}Document", type_name(namespace))
}

pub fn connection_type_name(namespace: &[String]) -> String {
    format!("{}Connection", type_name(namespace))
}

pub fn connection_edges_type_name(namespace: &[String]) -> String {
    format!("{}ConnectionEdges", type_name(namespace))
}

pub fn filter_type_name(namespace: &[String]) -> String {
    format!("{}Filter", type_name(namespace))
}

pub fn mutation_type_name(namespace: &[String]) -> String {
    format!("{}Mutation", type_name(namespace))
}

/// Union of the documents a reference field may point to
pub fn reference_type_name(namespace: &[String]) -> String {
    format!("{}Document", type_name(namespace))
}

pub fn fragment_name(namespace: &[String]) -> String {
    format!("{}Parts", type_name(namespace))
}

pub fn query_document_name(namespace: &[String]) -> String {
    format!("get{}Document", type_name(namespace))
}

pub fn query_list_name(namespace: &[String]) -> String {
    format!("get{}List", type_name(namespace))
}

pub fn create_mutation_name(namespace: &[String]) -> String {
    format!("create{}Document", type_name(namespace))
}

pub fn update_mutation_name(namespace: &[String]) -> String {
    format!("update{}Document", type_name(namespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("post"), "Post");
        assert_eq!(pascal_case("blog-post"), "BlogPost");
        assert_eq!(pascal_case("seo_meta"), "SeoMeta");
        assert_eq!(pascal_case("releaseDate"), "ReleaseDate");
    }

    #[test]
    fn test_generated_names() {
        let post = ns(&["post"]);
        assert_eq!(document_type_name(&post), "PostDocument");
        assert_eq!(connection_type_name(&post), "PostConnection");
        assert_eq!(query_document_name(&post), "getPostDocument");
        assert_eq!(query_list_name(&post), "getPostList");
        assert_eq!(update_mutation_name(&post), "updatePostDocument");
        assert_eq!(type_name(&ns(&["post", "blocks", "hero"])), "PostBlocksHero");
        assert_eq!(reference_type_name(&ns(&["post", "author"])), "PostAuthorDocument");
    }
}
