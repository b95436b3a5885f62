use layer_studio::draw::{
    Color, FillOp, HistoryEntry, HistoryLog, LayerStack, PixelSurface, Point, RecordingStrategy,
    Stroke,
};

const RED: Color = Color::rgb(255, 0, 0);
const GREEN: Color = Color::rgb(0, 200, 0);
const BLUE: Color = Color::rgb(0, 0, 255);

fn zigzag(offset: f32) -> Stroke {
    Stroke::pen(
        RED,
        4,
        vec![
            Point::new(4.0 + offset, 4.0),
            Point::new(20.0 + offset, 30.0),
            Point::new(36.0 + offset, 4.0),
            Point::new(52.0 + offset, 30.0),
        ],
    )
}

fn entries() -> Vec<HistoryEntry> {
    vec![
        zigzag(0.0).into(),
        FillOp::new(60, 60, GREEN).into(),
        Stroke::eraser(6, vec![Point::new(0.0, 50.0), Point::new(63.0, 50.0)]).into(),
        zigzag(6.0).into(),
        FillOp::new(0, 63, BLUE).into(),
    ]
}

#[test]
fn replay_matches_direct_application_at_every_cursor() {
    let mut log = HistoryLog::new(PixelSurface::blank(64, 64).snapshot()).with_checkpoint_interval(2);
    let mut direct = PixelSurface::blank(64, 64);
    let mut states = vec![direct.clone()];

    for entry in entries() {
        match &entry {
            HistoryEntry::Stroke(stroke) => {
                layer_studio::draw::render_stroke(&mut direct, stroke);
            }
            HistoryEntry::Fill(fill) => {
                layer_studio::draw::flood_fill(&mut direct, fill.x, fill.y, fill.color)
                    .expect("fill in bounds");
            }
            HistoryEntry::Snapshot(_) => unreachable!("only semantic entries"),
        }
        states.push(direct.clone());
        log.commit(entry).expect("commit");
    }

    for expected in states.iter().rev() {
        assert_eq!(log.reconstruct().expect("reconstruct"), expected);
        log.undo();
    }
    assert_eq!(log.cursor(), 0);

    while log.redo() {}
    assert_eq!(log.reconstruct().expect("reconstruct"), &direct);
}

#[test]
fn branch_after_undo_makes_old_tail_unreachable() {
    let mut log = HistoryLog::new(PixelSurface::blank(64, 64).snapshot());
    for entry in entries() {
        log.commit(entry).expect("commit");
    }
    log.undo();
    log.undo();
    log.undo();
    log.commit(FillOp::new(63, 0, BLUE).into()).expect("branch");

    assert_eq!(log.len(), 4);
    assert!(!log.can_redo());
    assert!(!log.redo());
}

#[test]
fn smoothing_is_visible_and_deterministic() {
    let mut first = HistoryLog::new(PixelSurface::blank(64, 64).snapshot());
    let mut second = HistoryLog::new(PixelSurface::blank(64, 64).snapshot());
    for log in [&mut first, &mut second] {
        log.commit(zigzag(0.0).into()).expect("commit");
    }
    let raw = first.reconstruct().expect("raw").clone();

    first.mark_smoothed(1).expect("smooth");
    second.mark_smoothed(1).expect("smooth");
    let smoothed = first.reconstruct().expect("smoothed").clone();

    assert_ne!(raw, smoothed);
    assert_eq!(second.reconstruct().expect("smoothed"), &smoothed);
}

#[test]
fn snapshot_and_replay_layers_agree_on_pixels() {
    let mut results = Vec::new();
    for strategy in [RecordingStrategy::Snapshots, RecordingStrategy::Replay] {
        let mut stack = LayerStack::new(64, 64).expect("canvas size").with_strategy(strategy);
        stack.add_layer(None);
        let layer = stack.drawable_layer_mut().expect("active");
        layer.apply_stroke(zigzag(0.0)).expect("stroke");
        layer.apply_fill(60, 60, GREEN).expect("fill");
        layer.apply_stroke(zigzag(6.0)).expect("stroke");
        layer.undo().expect("undo");
        results.push(layer.surface().clone());
    }
    assert_eq!(results[0], results[1]);
}
