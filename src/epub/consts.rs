//! Element, attribute, and namespace constants shared across the EPUB validators.

pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
pub const OPF_NAMESPACE: &str = "http://www.idpf.org/2007/opf";
pub const OPS_NAMESPACE: &str = "http://www.idpf.org/2007/ops";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const MIMETYPE_PATH: &str = "mimetype";
pub const MIMETYPE_CONTENTS: &str = "application/epub+zip";

pub const NAV_PROPERTY_TOC: &str = "toc";
pub const NAV_PROPERTY_LANDMARKS: &str = "landmarks";

pub const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// ARIA landmark roles considered "main" for EPUB-A11Y-018.
pub const MAIN_LANDMARK_ROLES: [&str; 1] = ["main"];

/// A conservative subset of the WAI-ARIA 1.2 role registry, sufficient to catch typo-class
/// mistakes (`rowgruop`) without vendoring the whole specification.
pub const KNOWN_ARIA_ROLES: &[&str] = &[
    "alert", "alertdialog", "application", "article", "banner", "button", "cell", "checkbox",
    "columnheader", "combobox", "complementary", "contentinfo", "definition", "dialog",
    "directory", "document", "feed", "figure", "form", "grid", "gridcell", "group", "heading",
    "img", "link", "list", "listbox", "listitem", "log", "main", "marquee", "math", "menu",
    "menubar", "menuitem", "menuitemcheckbox", "menuitemradio", "navigation", "none", "note",
    "option", "presentation", "progressbar", "radio", "radiogroup", "region", "row", "rowgroup",
    "rowheader", "scrollbar", "search", "searchbox", "separator", "slider", "spinbutton",
    "status", "switch", "tab", "table", "tablist", "tabpanel", "term", "textbox", "timer",
    "toolbar", "tooltip", "tree", "treegrid", "treeitem",
];

/// A conservative subset of recognized ARIA state/property attribute names, for EPUB-A11Y-008.
pub const KNOWN_ARIA_ATTRIBUTES: &[&str] = &[
    "aria-activedescendant",
    "aria-atomic",
    "aria-autocomplete",
    "aria-busy",
    "aria-checked",
    "aria-colcount",
    "aria-colindex",
    "aria-colspan",
    "aria-controls",
    "aria-current",
    "aria-describedby",
    "aria-details",
    "aria-disabled",
    "aria-dropeffect",
    "aria-errormessage",
    "aria-expanded",
    "aria-flowto",
    "aria-grabbed",
    "aria-haspopup",
    "aria-hidden",
    "aria-invalid",
    "aria-keyshortcuts",
    "aria-label",
    "aria-labelledby",
    "aria-level",
    "aria-live",
    "aria-modal",
    "aria-multiline",
    "aria-multiselectable",
    "aria-orientation",
    "aria-owns",
    "aria-placeholder",
    "aria-posinset",
    "aria-pressed",
    "aria-readonly",
    "aria-relevant",
    "aria-required",
    "aria-roledescription",
    "aria-rowcount",
    "aria-rowindex",
    "aria-rowspan",
    "aria-selected",
    "aria-setsize",
    "aria-sort",
    "aria-valuemax",
    "aria-valuemin",
    "aria-valuenow",
    "aria-valuetext",
];

/// Link text phrases that carry no meaning out of context, for EPUB-A11Y-017.
pub const NON_DESCRIPTIVE_LINK_TEXT: &[&str] =
    &["click here", "here", "read more", "more", "link", "this link", "more info"];
