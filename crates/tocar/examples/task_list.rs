//! Task-list demo: a small page under test and a suite exercising it.
//!
//! Run with `cargo run --example task_list`.

use tocar::{Document, Rect, Role, Storage, Suite, SuiteConfig};

/// A task-list page: a labelled input, an add button, and a draggable
/// card per task. Tasks persist to storage so they survive a refresh.
fn task_list_page(doc: &mut Document, storage: &mut Storage) {
    let root = doc.root();

    let label = doc.create_element("label");
    doc.set_label_for(label, "new-task");
    doc.set_text(label, "New task");
    doc.set_rect(label, Rect::new(10.0, 10.0, 80.0, 30.0));
    doc.append_child(root, label);

    let input = doc.create_element("input");
    doc.set_dom_id(input, "new-task");
    doc.set_input_type(input, "text");
    doc.set_rect(input, Rect::new(100.0, 10.0, 200.0, 30.0));
    doc.append_child(root, input);

    let add = doc.create_element("button");
    doc.set_text(add, "Add task");
    doc.set_rect(add, Rect::new(310.0, 10.0, 90.0, 30.0));
    doc.append_child(root, add);

    let list = doc.create_element("div");
    doc.set_rect(list, Rect::new(10.0, 60.0, 390.0, 500.0));
    doc.append_child(root, list);

    let render_task = |doc: &mut Document, list, title: &str, index: usize| {
        let card = doc.create_element("div");
        doc.set_draggable(card, true);
        doc.set_text(card, title);
        doc.set_rect(
            card,
            Rect::new(10.0, 60.0 + 40.0 * index as f64, 390.0, 36.0),
        );
        doc.append_child(list, card);
    };

    let stored: Vec<String> = storage
        .get("tasks")
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();
    for (i, title) in stored.iter().enumerate() {
        render_task(doc, list, title, i);
    }

    doc.on(add, "click", move |turn, _ev| {
        let title = turn.doc.value(input).to_string();
        if title.is_empty() {
            return Ok(());
        }
        let index = turn.doc.children(list).len();
        render_task(turn.doc, list, &title, index);
        turn.doc.set_value(input, "");

        let mut tasks: Vec<String> = turn
            .storage
            .get("tasks")
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();
        tasks.push(title);
        let json = serde_json::to_string(&tasks).map_err(|e| e.to_string())?;
        turn.storage.set("tasks", json);
        Ok(())
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut suite = Suite::new("task list", task_list_page)
        .with_config(SuiteConfig::default().with_case_timeout_ms(2000));

    suite.use_case("adds a task by typing", |ui, done| {
        ui.click_element(Role::FormField, "New task", 1)?;
        let after_typing = ui.clone();
        ui.type_into_focused_field("Water the plants", move || {
            after_typing.click_element(Role::Button, "Add task", 1)?;
            after_typing.count_elements_with_label(Role::Area, "Water the plants", 1)?;
            after_typing.field_should_have_value("New task", 1, "")?;
            done.signal();
            Ok(())
        })
    });

    suite.use_case("tasks survive a refresh", |ui, done| {
        ui.click_element(Role::FormField, "New task", 1)?;
        ui.paste_into_focused_field("Feed the cat")?;
        ui.click_element(Role::Button, "Add task", 1)?;
        let after_refresh = ui.clone();
        ui.refresh(move || {
            after_refresh.count_elements_with_label(Role::Area, "Feed the cat", 1)?;
            done.signal();
            Ok(())
        });
        Ok(())
    });

    suite.use_case("cards can be grabbed and dropped", |ui, done| {
        ui.click_element(Role::FormField, "New task", 1)?;
        ui.paste_into_focused_field("Buy milk")?;
        ui.click_element(Role::Button, "Add task", 1)?;
        ui.grab_element(Role::Area, "Buy milk", 1)?;
        let after_drag = ui.clone();
        ui.drag_grabbed_element_by(0.0, 80.0, move || {
            after_drag.drop_grabbed_element()?;
            done.signal();
            Ok(())
        })
    });

    let report = suite.run();
    println!(
        "{}: {} passed, {} failed, {} skipped",
        report.suite_name,
        report.passed_count(),
        report.failed_count(),
        report.skipped_count()
    );
    if let Some(failure) = report.first_failure() {
        println!(
            "first failure: {} ({})",
            failure.label,
            failure.error.as_deref().unwrap_or("unknown")
        );
        std::process::exit(1);
    }
}
