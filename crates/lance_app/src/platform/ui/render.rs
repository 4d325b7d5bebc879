//! Plain-text render surface for the job tracker and the mesh view.

use chrono::{DateTime, Local, NaiveDateTime};
use lance_core::scene::{EdgeStyle, Scene};
use lance_core::{AppViewModel, EventTone, JobView, MeshViewModel, SubtaskStatus};

pub const CANVAS_COLS: usize = 72;
pub const CANVAS_ROWS: usize = 20;
const FEED_LINES: usize = 12;

/// Renders the whole screen. `edge_intensity` is the current pulse flash in
/// `[0, 1]`, applied to every mesh edge.
pub fn render(view: &AppViewModel, edge_intensity: f64) -> String {
    let mut lines = vec![session_line(view)];
    if let Some(job) = &view.job {
        lines.push(String::new());
        job_lines(job, &mut lines);
    }
    if let Some(mesh) = &view.mesh {
        lines.push(String::new());
        mesh_lines(mesh, edge_intensity, &mut lines);
    }
    if view.job.is_none() && view.mesh.is_none() {
        lines.push("No view open. Type `mesh` or `job <id>`.".to_string());
    }
    lines.join("\n")
}

fn session_line(view: &AppViewModel) -> String {
    if view.session_loading {
        return "Session: loading".to_string();
    }
    match &view.user {
        Some(user) => format!("Signed in as {}", user.display_name()),
        None => "Not signed in".to_string(),
    }
}

fn job_lines(job: &JobView, lines: &mut Vec<String>) {
    lines.push(format!(
        "Job {} · {} [{}] · {}",
        job.job_id,
        job.title.as_deref().unwrap_or("Untitled job"),
        job.status.label(),
        job.link.label()
    ));
    if let Some(error) = &job.error {
        lines.push(format!("  ! {error}"));
    }

    if !job.subtasks.is_empty() {
        lines.push("Subtasks:".to_string());
        for subtask in &job.subtasks {
            let agent = subtask
                .agent_name
                .as_deref()
                .map(|name| format!(" @ {name}"))
                .unwrap_or_default();
            lines.push(format!(
                "  {} {} [{}]{}",
                subtask_marker(subtask.status),
                subtask.title,
                subtask.status.label(),
                agent
            ));
        }
    }

    if !job.deliverables.is_empty() {
        lines.push("Deliverables:".to_string());
        for deliverable in &job.deliverables {
            let summary = if deliverable.filename.is_empty() {
                excerpt(&deliverable.content, 60)
            } else {
                deliverable.filename.clone()
            };
            lines.push(format!("  - {}: {}", deliverable.kind, summary));
        }
    }

    lines.push("Timeline:".to_string());
    if job.timeline.is_empty() {
        lines.push("  Waiting for events".to_string());
    }
    for row in &job.timeline {
        let marker = if row.is_latest { '▶' } else { ' ' };
        lines.push(format!(
            "{marker} {} {} {}",
            format_timestamp(&row.timestamp),
            tone_glyph(row.tone),
            row.label
        ));
    }
}

fn mesh_lines(mesh: &MeshViewModel, edge_intensity: f64, lines: &mut Vec<String>) {
    let mut header = format!(
        "Mesh · {} · {} agents, {} links · {} events · zoom {:.2}",
        mesh.link.label(),
        mesh.node_count,
        mesh.edge_count,
        mesh.event_count,
        mesh.zoom
    );
    if mesh.layout_active {
        header.push_str(" · settling");
    }
    if let Some(id) = &mesh.dragging {
        header.push_str(&format!(" · dragging {id}"));
    }
    lines.push(header);
    if let Some(health) = &mesh.health {
        lines.push(format!(
            "Health: {} ({}/{} available)",
            health.status, health.agents_available, health.agents_total
        ));
    }
    if let Some(error) = &mesh.error {
        lines.push(format!("  ! {error}"));
    }

    match &mesh.scene {
        Some(scene) => {
            lines.extend(draw_canvas(scene, mesh.viewport, edge_intensity));
            for node in &scene.nodes {
                let pin = if node.pinned { " (pinned)" } else { "" };
                lines.push(format!(
                    "  {} {} {} · {}{}",
                    node_char(&node.name),
                    node.glyph,
                    node.name,
                    node.role,
                    pin
                ));
            }
        }
        None => lines.push("Loading topology".to_string()),
    }

    lines.push("Recent activity:".to_string());
    if mesh.feed.is_empty() {
        lines.push("  No activity yet".to_string());
    }
    for row in mesh.feed.iter().take(FEED_LINES) {
        lines.push(format!(
            "  {} {} {}: {}",
            format_timestamp(&row.timestamp),
            tone_glyph(row.tone),
            row.heading,
            row.label
        ));
    }
}

/// Rasterizes the scene into a bordered character grid covering `viewport`.
pub fn draw_canvas(scene: &Scene, viewport: (f64, f64), edge_intensity: f64) -> Vec<String> {
    let mut grid = vec![vec![' '; CANVAS_COLS]; CANVAS_ROWS];
    let (width, height) = viewport;
    let cell = |x: f64, y: f64| -> Option<(usize, usize)> {
        let col = (x / width * CANVAS_COLS as f64).floor();
        let row = (y / height * CANVAS_ROWS as f64).floor();
        let inside = (0.0..CANVAS_COLS as f64).contains(&col) && (0.0..CANVAS_ROWS as f64).contains(&row);
        inside.then_some((col as usize, row as usize))
    };

    let stroke = edge_char(EdgeStyle::at(edge_intensity));
    for edge in &scene.edges {
        let steps = (edge.from.distance(edge.to) / 4.0).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            let x = edge.from.x + (edge.to.x - edge.from.x) * t;
            let y = edge.from.y + (edge.to.y - edge.from.y) * t;
            if let Some((col, row)) = cell(x, y) {
                grid[row][col] = stroke;
            }
        }
    }
    for node in &scene.nodes {
        if let Some((col, row)) = cell(node.center.x, node.center.y) {
            grid[row][col] = node_char(&node.name);
        }
    }

    let border = format!("+{}+", "-".repeat(CANVAS_COLS));
    let mut lines = Vec::with_capacity(CANVAS_ROWS + 2);
    lines.push(border.clone());
    lines.extend(
        grid.into_iter()
            .map(|row| format!("|{}|", row.into_iter().collect::<String>())),
    );
    lines.push(border);
    lines
}

fn edge_char(style: EdgeStyle) -> char {
    if style.stroke.a >= 0.45 {
        '*'
    } else if style.stroke.a >= 0.25 {
        '+'
    } else {
        '.'
    }
}

fn node_char(name: &str) -> char {
    name.chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?')
}

fn tone_glyph(tone: EventTone) -> &'static str {
    match tone {
        EventTone::Info => "·",
        EventTone::Assigned => "→",
        EventTone::Running => "…",
        EventTone::Success => "✓",
        EventTone::Failure => "✗",
        EventTone::Transfer => "⇄",
    }
}

fn subtask_marker(status: SubtaskStatus) -> &'static str {
    match status {
        SubtaskStatus::Pending => "○",
        SubtaskStatus::WaitingDependency => "◌",
        SubtaskStatus::InProgress => "◐",
        SubtaskStatus::Completed => "●",
        SubtaskStatus::Failed => "✗",
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

/// Server timestamps as local wall-clock time; zone-less ones are shown as is.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return time.with_timezone(&Local).format("%H:%M:%S").to_string();
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return time.format("%H:%M:%S").to_string();
    }
    raw.to_string()
}
