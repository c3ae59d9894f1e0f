//! ワーカースタックのテンプレート組み立て

use crate::error::{ConfigError, Result};
use std::path::Path;

/// ブートスクリプトを差し込む位置
pub const BOOT_SCRIPT_PLACEHOLDER: &str = "${BootScriptContent}";

/// テンプレート内のブロックに合わせたインデント幅
pub const BOOT_SCRIPT_INDENT: usize = 10;

/// ブートスクリプトをテンプレートに埋め込む
///
/// スクリプトの各行を [`BOOT_SCRIPT_INDENT`] 桁インデントし、最初の
/// プレースホルダを置き換える。スクリプトの内容は変更しない。
pub fn render(template: &str, boot_script: &str) -> Result<String> {
    if !template.contains(BOOT_SCRIPT_PLACEHOLDER) {
        return Err(ConfigError::PlaceholderMissing {
            placeholder: BOOT_SCRIPT_PLACEHOLDER,
        });
    }

    let indent = " ".repeat(BOOT_SCRIPT_INDENT);
    let indented = boot_script
        .split('\n')
        .map(|line| format!("{}{}", indent, line))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(template.replacen(BOOT_SCRIPT_PLACEHOLDER, &indented, 1))
}

/// テンプレートとブートスクリプトを読み込んで組み立てる
pub fn load(template_path: &Path, boot_script_path: &Path) -> Result<String> {
    let template = read(template_path)?;
    let boot_script = read(boot_script_path)?;
    tracing::debug!(
        template = %template_path.display(),
        boot_script = %boot_script_path.display(),
        "Rendering worker template"
    );
    render(&template, &boot_script)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TEMPLATE: &str = "\
Resources:
  LaunchTemplate:
    Properties:
      UserData:
        Fn::Base64: |
${BootScriptContent}
";

    #[test]
    fn test_render_indents_every_line() {
        let rendered = render(TEMPLATE, "#!/bin/bash\necho hi").unwrap();

        assert!(rendered.contains("\n          #!/bin/bash\n          echo hi\n"));
        assert!(!rendered.contains(BOOT_SCRIPT_PLACEHOLDER));
    }

    #[test]
    fn test_render_keeps_script_verbatim() {
        let script = "  nested\t$VAR ${NotAPlaceholder}";
        let rendered = render("x: |\n${BootScriptContent}", script).unwrap();
        assert_eq!(rendered, format!("x: |\n          {}", script));
    }

    #[test]
    fn test_render_only_first_placeholder() {
        let rendered = render("${BootScriptContent}\n${BootScriptContent}", "a").unwrap();
        assert_eq!(rendered, "          a\n${BootScriptContent}");
    }

    #[test]
    fn test_render_without_placeholder() {
        let result = render("Resources: {}", "echo hi");
        assert!(matches!(result, Err(ConfigError::PlaceholderMissing { .. })));
    }

    #[test]
    fn test_load_reads_both_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let template_path = temp_dir.path().join("child_stack.yaml");
        let boot_path = temp_dir.path().join("child_boot.sh");
        fs::write(&template_path, TEMPLATE).unwrap();
        fs::write(&boot_path, "echo boot").unwrap();

        let rendered = load(&template_path, &boot_path).unwrap();
        assert!(rendered.contains("          echo boot"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.yaml");

        match load(&missing, &missing) {
            Err(ConfigError::ReadFile { path, .. }) => assert_eq!(path, missing),
            other => panic!("Expected ReadFile error, got {:?}", other),
        }
    }
}
