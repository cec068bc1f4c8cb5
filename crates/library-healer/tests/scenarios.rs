//! Scenario tests for library-healer.
//!
//! Drives the scheduler over an in-memory library the way a host would:
//! edit the files, report the edit as a `LibraryEvent`, heal to a fixpoint,
//! then inspect what ended up on disk.

use std::sync::{Arc, Mutex};

use library_codec::{TreeNodeStatus, read_status};
use library_healer::{
    DirtyReason, EventBus, FileSystem, FsLibraryVault, HealEvent, HealScheduler, HealerConfig,
    InMemoryFs, LibraryEvent, LibraryVault, ManualClock,
};

type Scheduler = HealScheduler<FsLibraryVault<Arc<InMemoryFs>>, ManualClock>;

// ============================================================================
// Helpers
// ============================================================================

fn library(files: &[(&str, &str)]) -> (Arc<InMemoryFs>, Scheduler, Arc<EventBus>) {
    let fs = Arc::new(InMemoryFs::with_files(files.iter().copied()));
    let events = Arc::new(EventBus::new());
    let scheduler = HealScheduler::new(
        FsLibraryVault::new(Arc::clone(&fs)),
        ManualClock::new(),
        HealerConfig::default(),
        Arc::clone(&events),
    );
    (fs, scheduler, events)
}

async fn heal_events(scheduler: &mut Scheduler, events: &[LibraryEvent]) -> usize {
    for event in events {
        scheduler.on_event(event);
    }
    let passes = scheduler.heal_until_idle().await.expect("healing failed");
    assert_eq!(scheduler.pending(), 0, "library did not settle");
    passes
}

fn status_of(fs: &InMemoryFs, path: &str) -> TreeNodeStatus {
    read_status(&fs.contents(path).unwrap_or_else(|| panic!("{} is missing", path)))
}

/// Re-marking every section of a settled library must change nothing.
async fn assert_settled(scheduler: &mut Scheduler) {
    let chains = scheduler.vault().snapshot().await.unwrap().all_section_chains();
    scheduler.mark_all_dirty(chains, DirtyReason::Suffix);
    let report = scheduler.run_batch().await.unwrap();
    assert_eq!(report.applied, 0, "settled library was rewritten");
    assert_eq!(report.follow_ups, 0);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_new_scroll_gets_canonical_name_and_reopens_section() {
    let (fs, mut scheduler, _events) = library(&[
        ("__.md", "- [x] [[__-Fruit|Fruit]]\n"),
        (
            "Fruit/__-Fruit.md",
            "---\nstatus: done\n---\n\n[[__|← Library]]\n\n- [x] [[Apple-Fruit|Apple]]\n",
        ),
        ("Fruit/Apple-Fruit.md", "---\nstatus: done\n---\n"),
    ]);

    fs.write("Fruit/Banana.md", b"Yellow.\n").await.unwrap();
    heal_events(
        &mut scheduler,
        &[LibraryEvent::Create("Fruit/Banana.md".parse().unwrap())],
    )
    .await;

    assert!(!fs.exists("Fruit/Banana.md").await.unwrap());
    assert_eq!(fs.contents("Fruit/Banana-Fruit.md").as_deref(), Some("Yellow.\n"));

    let codex = fs.contents("Fruit/__-Fruit.md").unwrap();
    assert!(codex.contains("- [x] [[Apple-Fruit|Apple]]"));
    assert!(codex.contains("- [ ] [[Banana-Fruit|Banana]]"));
    assert_eq!(status_of(&fs, "Fruit/__-Fruit.md"), TreeNodeStatus::NotStarted);
    assert_eq!(fs.contents("__.md").as_deref(), Some("- [ ] [[__-Fruit|Fruit]]\n"));

    assert_settled(&mut scheduler).await;
}

#[tokio::test]
async fn test_moved_folder_is_renamed_throughout() {
    let (fs, mut scheduler, _events) = library(&[
        ("__.md", "- [ ] [[__-Home|Home]]\n- [ ] [[__-Work|Work]]\n"),
        (
            "Home/__-Home.md",
            "[[__|← Library]]\n\n- [ ] [[__-kid-Home|kid]]\n- [ ] [[sis-Home|sis]]\n",
        ),
        ("Home/sis-Home.md", "Sister.\n"),
        ("Work/__-Work.md", "[[__|← Library]]\n\n- [ ] [[desk-Work|desk]]\n"),
        ("Work/desk-Work.md", ""),
        (
            "Home/kid/__-kid-Home.md",
            "[[__-Home|← Home]]\n\n- [ ] [[__-toys-kid-Home|toys]]\n- [ ] [[notes-kid-Home|notes]]\n",
        ),
        ("Home/kid/notes-kid-Home.md", "Notes.\n"),
        (
            "Home/kid/toys/__-toys-kid-Home.md",
            "[[__-kid-Home|← kid]]\n\n- [ ] [[lego-toys-kid-Home|lego]]\n",
        ),
        ("Home/kid/toys/lego-toys-kid-Home.md", ""),
    ]);

    fs.rename("Home/kid", "Work/kid").await.unwrap();
    heal_events(
        &mut scheduler,
        &[LibraryEvent::Rename {
            from: "Home/kid/".parse().unwrap(),
            to: "Work/kid/".parse().unwrap(),
        }],
    )
    .await;

    let mut paths = fs.paths().unwrap();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "Home/__-Home.md",
            "Home/sis-Home.md",
            "Work/__-Work.md",
            "Work/desk-Work.md",
            "Work/kid/__-kid-Work.md",
            "Work/kid/notes-kid-Work.md",
            "Work/kid/toys/__-toys-kid-Work.md",
            "Work/kid/toys/lego-toys-kid-Work.md",
            "__.md",
        ]
    );

    // Siblings are untouched
    assert_eq!(
        fs.contents("Home/sis-Home.md").as_deref(),
        Some("Sister.\n")
    );
    assert_eq!(
        fs.contents("Home/__-Home.md").as_deref(),
        Some("[[__|← Library]]\n\n- [ ] [[sis-Home|sis]]\n")
    );

    let work = fs.contents("Work/__-Work.md").unwrap();
    assert!(work.contains("- [ ] [[__-kid-Work|kid]]"));
    let kid = fs.contents("Work/kid/__-kid-Work.md").unwrap();
    assert!(kid.contains("[[__-Work|← Work]]"));
    assert!(kid.contains("- [ ] [[__-toys-kid-Work|toys]]"));
    assert!(kid.contains("- [ ] [[notes-kid-Work|notes]]"));
    let toys = fs.contents("Work/kid/toys/__-toys-kid-Work.md").unwrap();
    assert!(toys.contains("[[__-kid-Work|← kid]]"));
    assert!(toys.contains("- [ ] [[lego-toys-kid-Work|lego]]"));

    assert_settled(&mut scheduler).await;
}

#[tokio::test]
async fn test_consecutive_moves_collapse_to_final_place() {
    let (fs, mut scheduler, events) = library(&[
        ("__.md", "- [ ] [[__-A|A]]\n"),
        ("A/__-A.md", "[[__|← Library]]\n\n- [ ] [[note-A|note]]\n"),
        ("A/note-A.md", "Hello.\n"),
    ]);
    let renamed = Arc::new(Mutex::new(Vec::new()));
    let renamed_clone = Arc::clone(&renamed);
    let _sub = events.subscribe(move |event| {
        if let HealEvent::ActionApplied { action, .. } = event {
            if action.starts_with("rename") {
                renamed_clone.lock().unwrap().push(action);
            }
        }
    });

    fs.rename("A", "B").await.unwrap();
    fs.rename("B", "C").await.unwrap();
    heal_events(
        &mut scheduler,
        &[
            LibraryEvent::Rename {
                from: "A/".parse().unwrap(),
                to: "B/".parse().unwrap(),
            },
            LibraryEvent::Rename {
                from: "B/".parse().unwrap(),
                to: "C/".parse().unwrap(),
            },
        ],
    )
    .await;

    assert_eq!(fs.contents("C/note-C.md").as_deref(), Some("Hello.\n"));
    assert!(fs.contents("C/__-C.md").is_some());
    assert_eq!(fs.contents("__.md").as_deref(), Some("- [ ] [[__-C|C]]\n"));

    // One rename per node, straight to C
    let renamed = renamed.lock().unwrap();
    assert_eq!(renamed.len(), 2, "{:?}", renamed);
    assert!(renamed.iter().all(|r| r.ends_with("-C.md")));
}

#[tokio::test]
async fn test_ticked_checkbox_bubbles_to_root() {
    let (fs, mut scheduler, _events) = library(&[
        ("__.md", "- [ ] [[__-Fruit|Fruit]]\n"),
        (
            "Fruit/__-Fruit.md",
            "---\nstatus: not_started\n---\n\n[[__|← Library]]\n\n- [ ] [[__-Pie-Fruit|Pie]]\n",
        ),
        (
            "Fruit/Pie/__-Pie-Fruit.md",
            "---\nstatus: not_started\n---\n\n[[__-Fruit|← Fruit]]\n\n- [ ] [[Apple-Pie-Fruit|Apple]]\n",
        ),
        ("Fruit/Pie/Apple-Pie-Fruit.md", "---\nstatus: not_started\n---\n"),
    ]);

    // The user ticks Apple in Pie's codex
    let pie = fs.contents("Fruit/Pie/__-Pie-Fruit.md").unwrap();
    fs.write(
        "Fruit/Pie/__-Pie-Fruit.md",
        pie.replace("- [ ] [[Apple", "- [x] [[Apple").as_bytes(),
    )
    .await
    .unwrap();

    let passes = heal_events(
        &mut scheduler,
        &[LibraryEvent::CodexEdited("Fruit/Pie".parse().unwrap())],
    )
    .await;
    assert!(passes <= 3, "took {} passes", passes);

    assert_eq!(status_of(&fs, "Fruit/Pie/Apple-Pie-Fruit.md"), TreeNodeStatus::Done);
    assert_eq!(status_of(&fs, "Fruit/Pie/__-Pie-Fruit.md"), TreeNodeStatus::Done);
    assert_eq!(status_of(&fs, "Fruit/__-Fruit.md"), TreeNodeStatus::Done);
    assert!(
        fs.contents("Fruit/__-Fruit.md")
            .unwrap()
            .contains("- [x] [[__-Pie-Fruit|Pie]]")
    );
    assert_eq!(fs.contents("__.md").as_deref(), Some("- [x] [[__-Fruit|Fruit]]\n"));

    assert_settled(&mut scheduler).await;
}

#[tokio::test]
async fn test_status_toggle_wins_over_stale_checkbox() {
    let (fs, mut scheduler, _events) = library(&[
        ("__.md", "- [ ] [[__-Fruit|Fruit]]\n"),
        (
            "Fruit/__-Fruit.md",
            "---\nstatus: not_started\n---\n\n[[__|← Library]]\n\n- [ ] [[Apple-Fruit|Apple]]\n",
        ),
        ("Fruit/Apple-Fruit.md", "---\nstatus: not_started\n---\n"),
    ]);

    fs.write("Fruit/Apple-Fruit.md", b"---\nstatus: done\n---\n")
        .await
        .unwrap();
    heal_events(
        &mut scheduler,
        &[LibraryEvent::StatusToggle("Fruit/Apple.md".parse().unwrap())],
    )
    .await;

    assert_eq!(status_of(&fs, "Fruit/Apple-Fruit.md"), TreeNodeStatus::Done);
    assert!(
        fs.contents("Fruit/__-Fruit.md")
            .unwrap()
            .contains("- [x] [[Apple-Fruit|Apple]]")
    );
    assert_eq!(status_of(&fs, "Fruit/__-Fruit.md"), TreeNodeStatus::Done);
}

#[tokio::test]
async fn test_duplicate_codex_lines_collapse_to_one() {
    let (fs, mut scheduler, _events) = library(&[
        ("__.md", "- [ ] [[__-Fruit|Fruit]]\n"),
        (
            "Fruit/__-Fruit.md",
            "---\nstatus: not_started\n---\n\n[[__|← Library]]\n\n\
             - [ ] [[Apple-Old|Apple]]\n- [ ] [[Apple-Fruit|Apple]]\n",
        ),
        ("Fruit/Apple-Fruit.md", "---\nstatus: not_started\n---\n"),
    ]);

    heal_events(
        &mut scheduler,
        &[LibraryEvent::CodexEdited("Fruit".parse().unwrap())],
    )
    .await;

    assert_eq!(
        fs.contents("Fruit/__-Fruit.md").as_deref(),
        Some("---\nstatus: not_started\n---\n\n[[__|← Library]]\n\n- [ ] [[Apple-Fruit|Apple]]\n")
    );
    assert_settled(&mut scheduler).await;
}
