//! Request bodies sent to the staging endpoints.

/// Wraps `text` in CDATA sections.
///
/// A CDATA section cannot contain `]]>`, so every occurrence is split across
/// two adjacent sections: `]]` closes the first and `>` opens the next.
#[must_use]
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Builds the `promoteRequest` document used by every staging transition.
///
/// `description` is omitted from the document when `None`.
#[must_use]
pub fn promote_request_payload(stage_id: &str, description: Option<&str>) -> String {
    let mut data = format!("<stagedRepositoryId>{}</stagedRepositoryId>", cdata(stage_id));
    if let Some(description) = description {
        data.push_str(&format!("<description>{}</description>", cdata(description)));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<promoteRequest><data>{data}</data></promoteRequest>"
    )
}
