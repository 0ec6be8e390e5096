//! Server-rendered index page. One list item per project, keyed by name,
//! plus a small script that keeps a socket open and asks for updates.

use crate::projects::ProjectRegistry;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>GitHub Project Stats</title>
    <script>
        let ws;
        function connectWebSocket() {
            const scheme = window.location.protocol === "https:" ? "wss://" : "ws://";
            ws = new WebSocket(scheme + window.location.host + "/ws");
            ws.onmessage = function(event) {
                const data = JSON.parse(event.data);
                const status = document.getElementById("status");
                if (data.type === "error") {
                    status.textContent = "Update failed: " + data.message + " (" + data.kind + ")";
                    return;
                }
                status.textContent = "";
                const projectElement = document.getElementById(data.name);
                if (projectElement) {
                    projectElement.textContent = `${data.name}: ${data.stars} stars, ${data.forks} forks`;
                }
            };
            ws.onopen = function() {
                console.log("WebSocket connected");
                requestUpdate();
            };
            ws.onclose = function() {
                console.log("WebSocket disconnected. Reconnecting in 5 seconds...");
                setTimeout(connectWebSocket, 5000);
            };
        }

        function requestUpdate() {
            if (ws && ws.readyState === WebSocket.OPEN) {
                ws.send("update");
            }
        }

        window.onload = connectWebSocket;
    </script>
</head>
<body>
    <h1>GitHub Project Stats</h1>
    <button onclick="requestUpdate()">Refresh Stats</button>
    <p id="status"></p>
    <ul>
"#;

const PAGE_TAIL: &str = r#"    </ul>
</body>
</html>
"#;

/// Escapes text for use in element content and quoted attributes.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the page listing every tracked project as "Loading...".
pub fn render_index(registry: &ProjectRegistry) -> String {
    let mut html = String::from(PAGE_HEAD);
    for project in registry.projects() {
        let name = escape_html(&project.name);
        html.push_str(&format!("        <li id=\"{name}\">{name}: Loading...</li>\n"));
    }
    html.push_str(PAGE_TAIL);
    html
}
