//! Pipeline orchestration for one task.
//!
//! Takes a resolved document and drives the external encoder through every
//! segment encode and concatenation the document requires. Segment files
//! live in a per-task temporary directory removed when processing ends,
//! whether the task succeeded or not.

use std::path::{Path, PathBuf};

use crate::compiler;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher};
use crate::external::{run_encoder, EncoderSpawner};
use crate::metadata::{output_dir_for, EditMetadata, GroupInfo, OutputMode, Segment};
use crate::temp_files;

/// Fraction of the progress range spent on segment encodes in merge mode;
/// the remainder belongs to the final concatenation.
const MERGE_ENCODE_CEILING: u32 = 85;

/// Emits progress events, clamped so a task's progress never decreases.
struct ProgressTracker<'a> {
    task_id: &'a str,
    dispatcher: &'a EventDispatcher,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    fn new(task_id: &'a str, dispatcher: &'a EventDispatcher) -> Self {
        Self {
            task_id,
            dispatcher,
            last: 0,
        }
    }

    fn report(&mut self, progress: u32, status: impl Into<String>) {
        let progress = (progress.min(100) as u8).max(self.last);
        self.last = progress;
        self.dispatcher.emit(Event::TaskProgress {
            task_id: self.task_id.to_string(),
            progress,
            status: status.into(),
        });
    }
}

/// Runs one document end to end and returns the produced output paths in
/// group order.
pub fn process_task<S: EncoderSpawner>(
    task_id: &str,
    metadata: &EditMetadata,
    config: &CoreConfig,
    spawner: &S,
    dispatcher: &EventDispatcher,
) -> CoreResult<Vec<PathBuf>> {
    let active = metadata.active_groups();
    if active.is_empty() {
        return Err(CoreError::NoActiveGroups);
    }
    if metadata.output_mode == OutputMode::Merge && metadata.reference_resolution.is_none() {
        return Err(CoreError::MergePrecondition);
    }

    let output_dir = output_dir_for(metadata, &config.output_dir);
    std::fs::create_dir_all(&output_dir)?;
    let work_dir = temp_files::create_task_dir(config, &format!("vcm_{task_id}_"))?;

    let mut tracker = ProgressTracker::new(task_id, dispatcher);
    log::info!(
        "processing {} ({} group(s), {:?} mode)",
        metadata.video_file_name,
        active.len(),
        metadata.output_mode
    );

    let outputs = match metadata.output_mode {
        OutputMode::Separate => process_separate(
            metadata,
            &active,
            config,
            spawner,
            work_dir.path(),
            &output_dir,
            &mut tracker,
        )?,
        OutputMode::Merge => process_merge(
            metadata,
            &active,
            config,
            spawner,
            work_dir.path(),
            &output_dir,
            &mut tracker,
        )?,
    };

    tracker.report(100, format!("completed, {} output file(s)", outputs.len()));
    Ok(outputs)
}

/// Separate mode: one output per group. A group with a single segment is
/// moved into place directly; multi-segment groups are concatenated.
fn process_separate<S: EncoderSpawner>(
    metadata: &EditMetadata,
    active: &[(&GroupInfo, Vec<&Segment>)],
    config: &CoreConfig,
    spawner: &S,
    work_dir: &Path,
    output_dir: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> CoreResult<Vec<PathBuf>> {
    let multiple_groups = active.len() > 1;
    let total_groups = active.len() as u32;
    let mut outputs = Vec::with_capacity(active.len());

    for (group_index, (group, segments)) in active.iter().enumerate() {
        let group_index = group_index as u32;
        let segment_files = encode_group_segments(
            metadata,
            group,
            segments,
            config,
            spawner,
            work_dir,
            tracker,
            |segment_index, segment_count| {
                group_index * 100 / total_groups
                    + (segment_index * 100 / total_groups) / segment_count
            },
        )?;

        let name = super::outputs::group_output_name(metadata, group.id, multiple_groups);
        let target = super::outputs::unique_output_path(output_dir, &name);

        if segment_files.len() == 1 {
            move_into_place(&segment_files[0], &target, tracker.dispatcher)?;
        } else {
            tracker.report(
                (group_index + 1) * 90 / total_groups,
                format!("concatenating group {}", group.id),
            );
            concat_segments(spawner, work_dir, group.id, &segment_files, &target)?;
        }
        outputs.push(target);
    }

    Ok(outputs)
}

/// Merge mode: every segment of every group is normalized to the reference
/// resolution, then all of them are concatenated into a single timeline.
fn process_merge<S: EncoderSpawner>(
    metadata: &EditMetadata,
    active: &[(&GroupInfo, Vec<&Segment>)],
    config: &CoreConfig,
    spawner: &S,
    work_dir: &Path,
    output_dir: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> CoreResult<Vec<PathBuf>> {
    let total_segments: u32 = active.iter().map(|(_, s)| s.len() as u32).sum();
    let mut segment_files = Vec::new();
    let mut done: u32 = 0;

    for (group, segments) in active {
        for (index, segment) in segments.iter().enumerate() {
            let segment_file =
                temp_files::segment_file_path(work_dir, group.id, index, "mp4");
            tracker.report(
                done * MERGE_ENCODE_CEILING / total_segments,
                format!(
                    "encoding group {} segment {}/{}",
                    group.id,
                    index + 1,
                    segments.len()
                ),
            );
            encode_one_segment(
                metadata,
                group,
                segment,
                index,
                &segment_file,
                config,
                spawner,
            )?;
            segment_files.push(segment_file);
            done += 1;
        }
    }

    let name = super::outputs::group_output_name(metadata, 0, false);
    let target = super::outputs::unique_output_path(output_dir, &name);

    if segment_files.len() == 1 {
        move_into_place(&segment_files[0], &target, tracker.dispatcher)?;
    } else {
        tracker.report(MERGE_ENCODE_CEILING, "merging all segments");
        concat_segments(spawner, work_dir, 0, &segment_files, &target)?;
    }

    Ok(vec![target])
}

/// Encodes every segment of one group into the working directory,
/// reporting progress through the supplied mapping.
#[allow(clippy::too_many_arguments)]
fn encode_group_segments<S: EncoderSpawner>(
    metadata: &EditMetadata,
    group: &GroupInfo,
    segments: &[&Segment],
    config: &CoreConfig,
    spawner: &S,
    work_dir: &Path,
    tracker: &mut ProgressTracker<'_>,
    progress_for: impl Fn(u32, u32) -> u32,
) -> CoreResult<Vec<PathBuf>> {
    let segment_count = segments.len() as u32;
    let mut segment_files = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().enumerate() {
        let segment_file = temp_files::segment_file_path(work_dir, group.id, index, "mp4");
        tracker.report(
            progress_for(index as u32, segment_count),
            format!(
                "encoding group {} segment {}/{}",
                group.id,
                index + 1,
                segment_count
            ),
        );
        encode_one_segment(
            metadata,
            group,
            segment,
            index,
            &segment_file,
            config,
            spawner,
        )?;
        segment_files.push(segment_file);
    }

    Ok(segment_files)
}

fn encode_one_segment<S: EncoderSpawner>(
    metadata: &EditMetadata,
    group: &GroupInfo,
    segment: &Segment,
    index: usize,
    segment_file: &Path,
    config: &CoreConfig,
    spawner: &S,
) -> CoreResult<()> {
    let args = compiler::build_encode_args(metadata, group, segment, segment_file, config)?;
    run_encoder(spawner, "ffmpeg (encode)", &args).map_err(|e| CoreError::SegmentEncode {
        group: group.id,
        segment: index + 1,
        message: e.to_string(),
    })
}

/// Writes the concat list and runs the stream-copy concatenation.
fn concat_segments<S: EncoderSpawner>(
    spawner: &S,
    work_dir: &Path,
    group_id: u32,
    segment_files: &[PathBuf],
    target: &Path,
) -> CoreResult<()> {
    let list_file = work_dir.join(format!("segments_group{group_id}.txt"));
    let mut list = String::new();
    for file in segment_files {
        list.push_str(&format!("file '{}'\n", file.display()));
    }
    std::fs::write(&list_file, list)?;

    let args = compiler::build_concat_args(&list_file, target);
    run_encoder(spawner, "ffmpeg (concat)", &args).map_err(|e| CoreError::Concat {
        target: target.display().to_string(),
        message: e.to_string(),
    })
}

/// Moves a finished segment to its final name. Falls back to copy+delete
/// when the rename crosses filesystems; a leftover source file surfaces
/// as a warning event rather than failing the task.
fn move_into_place(from: &Path, to: &Path, dispatcher: &EventDispatcher) -> CoreResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    if let Err(e) = std::fs::remove_file(from) {
        let message = format!("failed to remove moved segment {}: {e}", from.display());
        log::warn!("{message}");
        dispatcher.emit(Event::Warning { message });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use crate::external::mocks::MockSpawner;
    use crate::metadata::{
        CropOrigin, GroupInfo, OutputMode, ReferenceResolution, Rotation, Segment, VideoCodec,
    };
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl EventHandler for Recorder {
        fn handle(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn recording_dispatcher() -> (EventDispatcher, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(Arc::new(Recorder {
            events: events.clone(),
        }));
        (dispatcher, events)
    }

    fn group(id: u32) -> GroupInfo {
        GroupInfo {
            id,
            width: 640,
            height: 360,
            rotation: Rotation::None,
        }
    }

    fn segment(group_id: u32, start: f64, end: f64) -> Segment {
        Segment {
            center_x: 960,
            center_y: 540,
            group_id,
            start_time: start,
            end_time: end,
        }
    }

    fn metadata_with(
        groups: Vec<GroupInfo>,
        segments: Vec<Segment>,
        output_mode: OutputMode,
    ) -> EditMetadata {
        EditMetadata {
            id: "doc".into(),
            video_file_name: "clip.mp4".into(),
            video_path: "/videos/clip.mp4".into(),
            format_version: "2".into(),
            video_width: 1920,
            video_height: 1080,
            video_rotation: Rotation::None,
            crop_origin: CropOrigin::TopLeft,
            groups: groups.into_iter().map(|g| (g.id, g)).collect(),
            segments,
            output_mode,
            reference_resolution: Some(ReferenceResolution {
                width: 1920,
                height: 1080,
            }),
            encoding_settings: Default::default(),
            remote_source: false,
        }
    }

    fn config_in(dir: &Path) -> CoreConfig {
        CoreConfig {
            share_dir: dir.join("share"),
            output_dir: dir.join("out"),
            ..CoreConfig::default()
        }
    }

    #[test]
    fn single_group_single_segment_produces_one_unsuffixed_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0)],
            OutputMode::Separate,
        );

        let outputs =
            process_task("t1", &metadata, &config, &spawner, &dispatcher).unwrap();

        assert_eq!(outputs, vec![dir.path().join("out").join("clip.mp4")]);
        assert!(outputs[0].exists());
        // one encode, no concat
        assert_eq!(spawner.received_calls().len(), 1);
    }

    #[test]
    fn two_groups_get_group_suffixed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1), group(2)],
            vec![segment(1, 0.0, 2.0), segment(2, 3.0, 5.0)],
            OutputMode::Separate,
        );

        let outputs =
            process_task("t2", &metadata, &config, &spawner, &dispatcher).unwrap();

        let names: Vec<String> = outputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["clip_group1.mp4", "clip_group2.mp4"]);
    }

    #[test]
    fn multi_segment_group_is_concatenated_stream_copy() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0), segment(1, 4.0, 6.0)],
            OutputMode::Separate,
        );

        process_task("t3", &metadata, &config, &spawner, &dispatcher).unwrap();

        let calls = spawner.received_calls();
        assert_eq!(calls.len(), 3);
        let concat = &calls[2];
        assert!(concat.iter().any(|a| a == "concat"));
        assert!(concat.windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
    }

    #[test]
    fn segment_failure_aborts_task_with_segment_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        spawner.fail_when("-ss", "encoder exploded");
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0), segment(1, 4.0, 6.0)],
            OutputMode::Separate,
        );

        let err = process_task("t4", &metadata, &config, &spawner, &dispatcher).unwrap_err();
        match err {
            CoreError::SegmentEncode { group, segment, .. } => {
                assert_eq!(group, 1);
                assert_eq!(segment, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // first segment failed, nothing else ran
        assert_eq!(spawner.received_calls().len(), 1);
    }

    #[test]
    fn merge_mode_concatenates_all_groups_into_one_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1), group(2)],
            vec![segment(1, 0.0, 2.0), segment(2, 3.0, 5.0)],
            OutputMode::Merge,
        );

        let outputs =
            process_task("t5", &metadata, &config, &spawner, &dispatcher).unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(
            outputs[0].file_name().unwrap().to_string_lossy(),
            "clip.mp4"
        );
        // two encodes plus one concat
        assert_eq!(spawner.received_calls().len(), 3);
    }

    #[test]
    fn merge_without_reference_resolution_fails_before_any_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let mut metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0)],
            OutputMode::Merge,
        );
        metadata.reference_resolution = None;

        let err = process_task("t6", &metadata, &config, &spawner, &dispatcher).unwrap_err();
        assert!(matches!(err, CoreError::MergePrecondition));
        assert!(spawner.received_calls().is_empty());
    }

    #[test]
    fn rerun_on_same_inputs_does_not_overwrite_prior_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0)],
            OutputMode::Separate,
        );

        let first = process_task("t7", &metadata, &config, &spawner, &dispatcher).unwrap();
        let second = process_task("t8", &metadata, &config, &spawner, &dispatcher).unwrap();

        assert_eq!(
            first[0].file_name().unwrap().to_string_lossy(),
            "clip.mp4"
        );
        assert_eq!(
            second[0].file_name().unwrap().to_string_lossy(),
            "clip(1).mp4"
        );
        assert!(first[0].exists() && second[0].exists());
    }

    #[test]
    fn progress_is_monotone_and_reaches_100() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, events) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1), group(2)],
            vec![
                segment(1, 0.0, 2.0),
                segment(1, 3.0, 4.0),
                segment(2, 5.0, 6.0),
            ],
            OutputMode::Separate,
        );

        process_task("t9", &metadata, &config, &spawner, &dispatcher).unwrap();

        let progress: Vec<u8> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::TaskProgress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*progress.last().unwrap(), 100);
    }

    #[test]
    fn working_files_are_gone_after_processing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0), segment(1, 4.0, 6.0)],
            OutputMode::Separate,
        );

        process_task("t10", &metadata, &config, &spawner, &dispatcher).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(config.output_dir.clone())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn no_active_groups_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let metadata = metadata_with(vec![group(1)], vec![segment(0, 0.0, 2.0)], OutputMode::Separate);

        let err = process_task("t11", &metadata, &config, &spawner, &dispatcher).unwrap_err();
        assert!(matches!(err, CoreError::NoActiveGroups));
    }

    #[test]
    fn copy_codec_runs_trim_only_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let mut metadata = metadata_with(
            vec![group(1)],
            vec![segment(1, 0.0, 2.0)],
            OutputMode::Separate,
        );
        metadata.encoding_settings.codec = Some(VideoCodec::Copy);

        process_task("t12", &metadata, &config, &spawner, &dispatcher).unwrap();

        let call = &spawner.received_calls()[0];
        assert!(!call.iter().any(|a| a == "-vf"));
    }

    #[test]
    fn groups_map_insertion_order_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let spawner = MockSpawner::new();
        let (dispatcher, _) = recording_dispatcher();

        let mut groups = BTreeMap::new();
        for g in [group(7), group(2)] {
            groups.insert(g.id, g);
        }
        let mut metadata = metadata_with(
            Vec::new(),
            vec![segment(7, 0.0, 1.0), segment(2, 2.0, 3.0)],
            OutputMode::Separate,
        );
        metadata.groups = groups;

        let outputs =
            process_task("t13", &metadata, &config, &spawner, &dispatcher).unwrap();
        let names: Vec<String> = outputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["clip_group2.mp4", "clip_group7.mp4"]);
    }
}
