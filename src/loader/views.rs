use camino::{Utf8Path, Utf8PathBuf};
use minijinja::{Environment, context};

use crate::config::ViewsConfig;
use crate::error::AssetError;
use crate::glob::GlobPattern;

/// Renders every matched page to `<out_dir>/<relative path>`.
///
/// Templates are resolved against the template root, so pages can `extends`
/// and `include` layouts and partials that live outside the page pattern.
/// With a reload port the live-reload script is injected into each page.
pub fn render(config: &ViewsConfig, reload_port: Option<u16>) -> Result<Vec<Utf8PathBuf>, AssetError> {
    let pattern = GlobPattern::new(&config.sources)?;

    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(&config.root));

    let mut outputs = Vec::new();
    for path in pattern.walk()? {
        let name = template_name(&config.root, &path);

        let html = env
            .get_template(name.as_str())
            .and_then(|template| template.render(context! { dev => reload_port.is_some() }))
            .map_err(|e| AssetError::transform("templates", &path, format!("{e:#}")))?;

        let html = match reload_port {
            Some(port) => inject_reload(&html, port),
            None => html,
        };

        let out = config.out_dir.join(pattern.relative(&path));
        crate::utils::write_output(&out, html)?;
        outputs.push(out);
    }

    tracing::debug!(pages = outputs.len(), "rendered views");
    Ok(outputs)
}

/// Name of the page as seen by the loader: its path below the template root,
/// always with forward slashes.
fn template_name(root: &Utf8Path, path: &Utf8Path) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    let root = root.strip_prefix("./").unwrap_or(root);

    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inserts the live-reload client before the closing `</body>`, or appends it
/// when the page has none.
pub fn inject_reload(html: &str, port: u16) -> String {
    let script = format!(
        r#"<script>
const socket = new WebSocket("ws://" + location.hostname + ":{port}");
socket.addEventListener("message", event => {{
    window.location.reload();
}});
</script>
"#
    );

    match html.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..at]);
            out.push_str(&script);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{script}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> (tempfile::TempDir, Utf8PathBuf, ViewsConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let views = root.join("src/views");

        fs::create_dir_all(views.join("layouts")).unwrap();
        fs::create_dir_all(views.join("partials")).unwrap();
        fs::write(
            views.join("layouts/base.html"),
            "<html><body>{% block main %}{% endblock %}</body></html>",
        )
        .unwrap();
        fs::write(views.join("partials/nav.html"), "<nav>home</nav>").unwrap();
        fs::write(
            views.join("index.html"),
            "{% extends \"layouts/base.html\" %}{% block main %}{% include \"partials/nav.html\" %}<p>{% if dev %}dev{% else %}prod{% endif %}</p>{% endblock %}",
        )
        .unwrap();

        let config = ViewsConfig {
            sources: format!("{views}/*.html"),
            root: views,
            out_dir: root.join("dist"),
        };

        (dir, root, config)
    }

    #[test]
    fn test_render_with_layout() {
        let (_dir, root, config) = setup();

        let outputs = render(&config, None).unwrap();

        assert_eq!(outputs, vec![root.join("dist/index.html")]);
        assert_eq!(
            fs::read_to_string(&outputs[0]).unwrap(),
            "<html><body><nav>home</nav><p>prod</p></body></html>"
        );
        assert!(!root.join("dist/layouts").exists());
    }

    #[test]
    fn test_render_in_watch_mode() {
        let (_dir, root, config) = setup();

        render(&config, Some(35729)).unwrap();

        let html = fs::read_to_string(root.join("dist/index.html")).unwrap();
        assert!(html.contains("<p>dev</p>"));
        assert!(html.contains(":35729"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn test_missing_include() {
        let (_dir, root, config) = setup();
        fs::write(root.join("src/views/broken.html"), "{% include \"nope.html\" %}").unwrap();

        match render(&config, None).unwrap_err() {
            AssetError::Transform { tool, path, .. } => {
                assert_eq!(tool, "templates");
                assert_eq!(path, root.join("src/views/broken.html"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_inject_without_body() {
        let html = inject_reload("<p>bare</p>", 1234);
        assert!(html.starts_with("<p>bare</p><script>"));
        assert!(html.contains(":1234"));
    }

    #[test]
    fn test_inject_before_last_body() {
        let html = inject_reload("<body>a</body><body>b</body>", 1);
        let at = html.find("<script>").unwrap();
        assert_eq!(&html[..at], "<body>a</body><body>b");
    }
}
