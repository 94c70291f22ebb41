use std::collections::HashMap;

pub trait Keyframe {
    fn frame_index(&self) -> u32;

    /// Position of the keyframe within its track.
    fn set_index(&mut self, _index: usize) {}
}

/// Keyframes of one bone or morph, keyed by frame index.
#[derive(Debug, Clone)]
pub struct MotionTrack<K: Sized> {
    pub(crate) id: i32,
    pub name: String,
    pub keyframes: HashMap<u32, K>,
    pub ordered_frame_index: Vec<u32>,
}

impl<K> MotionTrack<K>
where
    K: Keyframe,
{
    fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            keyframes: HashMap::new(),
            ordered_frame_index: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Nearest keyframe strictly before `frame_index` and nearest strictly
    /// after it, the latter falling back to the last keyframe of the track.
    pub fn search_closest(&self, frame_index: u32) -> (Option<&K>, Option<&K>) {
        let (prev_pos, next_pos) = match self.ordered_frame_index.binary_search(&frame_index) {
            Ok(pos) => (pos.checked_sub(1), pos + 1),
            Err(pos) => (pos.checked_sub(1), pos),
        };
        (
            prev_pos
                .and_then(|pos| self.ordered_frame_index.get(pos))
                .and_then(|frame| self.keyframes.get(frame)),
            self.ordered_frame_index
                .get(next_pos)
                .or(self.ordered_frame_index.last())
                .and_then(|frame| self.keyframes.get(frame)),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.ordered_frame_index
            .iter()
            .filter_map(|frame| self.keyframes.get(frame))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IdAllocator(i32);

impl IdAllocator {
    pub fn next(&mut self) -> i32 {
        self.0 += 1;
        self.0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Name-keyed set of tracks. Every name is assigned a stable id the first
/// time it is seen, and ids are never reused until the bundle is cleared.
#[derive(Debug, Clone)]
pub struct MotionTrackBundle<K: Sized> {
    allocator: IdAllocator,
    pub(crate) tracks: HashMap<String, MotionTrack<K>>,
}

impl<K> Default for MotionTrackBundle<K> {
    fn default() -> Self {
        Self {
            allocator: IdAllocator::default(),
            tracks: HashMap::new(),
        }
    }
}

impl<K> MotionTrackBundle<K>
where
    K: Keyframe,
{
    pub fn new() -> MotionTrackBundle<K> {
        Self::default()
    }

    pub fn keyframe_len(&self) -> usize {
        self.tracks.values().map(|track| track.len()).sum()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&MotionTrack<K>> {
        self.tracks.get(name)
    }

    pub(crate) fn get_mut_by_name(&mut self, name: &str) -> Option<&mut MotionTrack<K>> {
        self.tracks.get_mut(name)
    }

    pub fn track_names(&self) -> impl Iterator<Item = &String> {
        self.tracks.keys()
    }

    pub fn resolve_id(&self, id: i32) -> Option<&String> {
        self.tracks
            .values()
            .find(|track| track.id == id)
            .map(|track| &track.name)
    }

    pub fn resolve_name(&self, name: &str) -> Option<i32> {
        self.get_by_name(name).map(|track| track.id)
    }

    pub(crate) fn resolve_name_or_new(&mut self, name: &str) -> i32 {
        let allocator = &mut self.allocator;
        self.tracks
            .entry(name.to_owned())
            .or_insert_with(|| MotionTrack::new(allocator.next(), name))
            .id
    }

    /// Registers a track under an id read from a file. Later fresh ids are
    /// allocated above it.
    pub(crate) fn insert_track_with_id(&mut self, id: i32, name: &str) {
        if self.allocator.0 < id {
            self.allocator.0 = id;
        }
        self.tracks
            .entry(name.to_owned())
            .or_insert_with(|| MotionTrack::new(id, name));
    }

    pub fn contains(&self, name: &str, frame_index: u32) -> bool {
        self.find(name, frame_index).is_some()
    }

    pub fn find(&self, name: &str, frame_index: u32) -> Option<&K> {
        self.tracks
            .get(name)
            .and_then(|track| track.keyframes.get(&frame_index))
    }

    pub(crate) fn find_mut(&mut self, name: &str, frame_index: u32) -> Option<&mut K> {
        self.tracks
            .get_mut(name)
            .and_then(|track| track.keyframes.get_mut(&frame_index))
    }

    /// Inserts or replaces the keyframe at its own frame index, returning the
    /// replaced one.
    pub(crate) fn force_add_keyframe(&mut self, keyframe: K, track_name: &str) -> Option<K> {
        let frame_index = keyframe.frame_index();
        let allocator = &mut self.allocator;
        let track = self
            .tracks
            .entry(track_name.to_owned())
            .or_insert_with(|| MotionTrack::new(allocator.next(), track_name));
        let old = track.keyframes.insert(frame_index, keyframe);
        if old.is_none() {
            let pos = track
                .ordered_frame_index
                .binary_search(&frame_index)
                .unwrap_or_else(|e| e);
            track.ordered_frame_index.insert(pos, frame_index);
        }
        old
    }

    pub(crate) fn remove_keyframe(&mut self, frame_index: u32, name: &str) -> Option<K> {
        let track = self.get_mut_by_name(name)?;
        let removed = track.keyframes.remove(&frame_index)?;
        if let Ok(pos) = track.ordered_frame_index.binary_search(&frame_index) {
            track.ordered_frame_index.remove(pos);
        }
        Some(removed)
    }

    pub(crate) fn reindex(&mut self) {
        for track in self.tracks.values_mut() {
            for (index, frame_index) in track.ordered_frame_index.iter().enumerate() {
                if let Some(keyframe) = track.keyframes.get_mut(frame_index) {
                    keyframe.set_index(index);
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.allocator.clear();
        self.tracks = HashMap::new();
    }

    pub fn find_keyframes_map(&self, track_name: &str) -> Option<&HashMap<u32, K>> {
        self.tracks.get(track_name).map(|track| &track.keyframes)
    }

    pub fn search_closest(&self, track_name: &str, frame_index: u32) -> (Option<&K>, Option<&K>) {
        self.tracks
            .get(track_name)
            .map(|track| track.search_closest(frame_index))
            .unwrap_or((None, None))
    }

    /// All keyframes ordered by frame index, ties broken by track id so the
    /// order is stable between runs.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        let mut keyframes = self
            .tracks
            .values()
            .flat_map(|track| track.iter().map(move |keyframe| (track.id, keyframe)))
            .collect::<Vec<_>>();
        keyframes.sort_by_key(|(id, keyframe)| (keyframe.frame_index(), *id));
        keyframes.into_iter().map(|(_, keyframe)| keyframe)
    }

    /// Pairs of track name and keyframe, in the same order as [`Self::iter`].
    pub fn iter_with_name(&self) -> impl Iterator<Item = (&String, &K)> {
        let mut keyframes = self
            .tracks
            .values()
            .flat_map(|track| {
                track
                    .iter()
                    .map(move |keyframe| (track.id, &track.name, keyframe))
            })
            .collect::<Vec<_>>();
        keyframes.sort_by_key(|(id, _, keyframe)| (keyframe.frame_index(), *id));
        keyframes
            .into_iter()
            .map(|(_, name, keyframe)| (name, keyframe))
    }

    pub fn max_frame_index(&self) -> Option<u32> {
        self.tracks
            .values()
            .filter_map(|track| track.ordered_frame_index.last())
            .max()
            .copied()
    }
}

#[cfg(test)]
impl Keyframe for u32 {
    fn frame_index(&self) -> u32 {
        *self
    }
}

#[test]
fn test_search_closest() {
    let mut bundle = MotionTrackBundle::<u32>::new();
    for frame in [10u32, 20, 30] {
        bundle.force_add_keyframe(frame, "track");
    }
    assert_eq!((None, Some(&10)), bundle.search_closest("track", 5));
    assert_eq!((None, Some(&20)), bundle.search_closest("track", 10));
    assert_eq!((Some(&10), Some(&20)), bundle.search_closest("track", 15));
    assert_eq!((Some(&10), Some(&30)), bundle.search_closest("track", 20));
    assert_eq!((Some(&20), Some(&30)), bundle.search_closest("track", 30));
    assert_eq!((Some(&30), Some(&30)), bundle.search_closest("track", 40));
    assert_eq!((None, None), bundle.search_closest("unknown", 15));
}

#[test]
fn test_track_ids_and_ordering() {
    let mut bundle = MotionTrackBundle::<u32>::new();
    let a = bundle.resolve_name_or_new("a");
    let b = bundle.resolve_name_or_new("b");
    assert_ne!(a, b);
    assert_eq!(a, bundle.resolve_name_or_new("a"));
    assert_eq!(Some(&"b".to_owned()), bundle.resolve_id(b));
    bundle.force_add_keyframe(7, "b");
    bundle.force_add_keyframe(3, "a");
    bundle.force_add_keyframe(7, "a");
    assert_eq!(Some(7), bundle.force_add_keyframe(7, "a"));
    assert_eq!(3, bundle.keyframe_len());
    assert_eq!(vec![3, 7, 7], bundle.iter().copied().collect::<Vec<_>>());
    assert_eq!(Some(7), bundle.remove_keyframe(7, "a"));
    assert_eq!(None, bundle.remove_keyframe(7, "a"));
    assert_eq!(Some(7), bundle.max_frame_index());
    bundle.insert_track_with_id(10, "c");
    assert_eq!(11, bundle.resolve_name_or_new("d"));
    bundle.clear();
    assert_eq!(0, bundle.keyframe_len());
}
