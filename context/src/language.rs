//! Extension -> code-fence language tag.
//!
//! Only used so the fence marker in a file header costs what it would in a
//! real prompt. Nothing here inspects file contents.

const LANGUAGES: &[(&str, &str)] = &[
    (".bash", "bash"),
    (".c", "c"),
    (".cc", "cpp"),
    (".cpp", "cpp"),
    (".cs", "csharp"),
    (".cshtml", "razor"),
    (".css", "css"),
    (".csproj", "xml"),
    (".dart", "dart"),
    (".go", "go"),
    (".h", "c"),
    (".hpp", "cpp"),
    (".html", "html"),
    (".java", "java"),
    (".js", "javascript"),
    (".json", "json"),
    (".jsx", "jsx"),
    (".kt", "kotlin"),
    (".lua", "lua"),
    (".md", "markdown"),
    (".php", "php"),
    (".ps1", "powershell"),
    (".py", "python"),
    (".razor", "razor"),
    (".rb", "ruby"),
    (".rs", "rust"),
    (".scss", "scss"),
    (".sh", "bash"),
    (".sln", "text"),
    (".sql", "sql"),
    (".swift", "swift"),
    (".toml", "toml"),
    (".ts", "typescript"),
    (".tsx", "tsx"),
    (".txt", "text"),
    (".vb", "vbnet"),
    (".vue", "vue"),
    (".xaml", "xml"),
    (".xml", "xml"),
    (".yaml", "yaml"),
    (".yml", "yaml"),
];

/// Language tag for a normalised extension.
///
/// Unknown extensions use the extension itself without the dot; files with
/// no extension use `text`.
#[must_use]
pub fn language_for_extension(extension: &str) -> &str {
    if let Ok(idx) = LANGUAGES.binary_search_by(|(ext, _)| (*ext).cmp(extension)) {
        return LANGUAGES[idx].1;
    }
    match extension.trim_start_matches('.') {
        "" => "text",
        bare => bare,
    }
}
