//! Concatenate section snapshots into one guide document.
//!
//! Every source document is renumbered into the id space of the output and
//! its pages are appended, in the order given, under a single new page tree.
//! Attributes a page inherited from its old tree (media box, resources) are
//! copied onto the page first so nothing is lost when the tree is replaced.
//!
//! lopdf is synchronous and a guide can run to hundreds of pages, so the
//! work runs inside `spawn_blocking`. The result is written to a temporary
//! file beside the target and renamed into place: a crash never leaves a
//! truncated guide that a later run would mistake for finished work.
//!
//! Dropping the [`merge`] future (a guide abandoned at its deadline) cannot
//! stop the blocking task, but it marks the merge abandoned and the task then
//! discards its temporary file instead of renaming it into place.

use crate::error::BinderError;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Letter size in PDF points, used for placeholder pages.
const PLACEHOLDER_BOX: [i64; 4] = [0, 0, 612, 792];

/// Keys a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards against malformed trees whose `Parent` links form a cycle.
const MAX_TREE_DEPTH: usize = 64;

/// One slot of the merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePart {
    /// All pages of a snapshot file.
    Snapshot(PathBuf),
    /// A single "Section N unavailable" page.
    Placeholder { index: usize },
}

/// Merge `parts` in order into `output`. Returns the page count written.
///
/// # Errors
/// [`BinderError::Merge`] if a snapshot cannot be parsed or nothing would
/// be written; [`BinderError::Io`] if the output cannot be created.
pub async fn merge(parts: Vec<MergePart>, output: &Path) -> Result<usize, BinderError> {
    let output = output.to_path_buf();
    let guard = AbandonOnDrop(Arc::new(AtomicBool::new(false)));
    let abandoned = Arc::clone(&guard.0);
    tokio::task::spawn_blocking(move || merge_blocking(&parts, &output, &abandoned))
        .await
        .map_err(|e| BinderError::Internal(format!("Merge task panicked: {}", e)))?
}

/// Raises its flag when the awaiting future goes away.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn merge_blocking(parts: &[MergePart], output: &Path, abandoned: &AtomicBool) -> Result<usize, BinderError> {
    if !parts.iter().any(|p| matches!(p, MergePart::Snapshot(_))) {
        return Err(merge_err(output, "no snapshots to merge"));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut font_id: Option<ObjectId> = None;
    let mut kids: Vec<ObjectId> = Vec::new();

    for part in parts {
        match part {
            MergePart::Snapshot(path) => {
                let src = Document::load(path)
                    .map_err(|e| merge_err(output, format!("{}: {}", path.display(), e)))?;
                if src.is_encrypted() {
                    return Err(merge_err(output, format!("{}: encrypted", path.display())));
                }
                let page_ids = import_pages(&mut doc, src)
                    .map_err(|e| merge_err(output, format!("{}: {}", path.display(), e)))?;
                debug!("{}: {} page(s)", path.display(), page_ids.len());
                kids.extend(page_ids);
            }
            MergePart::Placeholder { index } => {
                let font = *font_id.get_or_insert_with(|| {
                    doc.add_object(dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => "Helvetica",
                    })
                });
                kids.push(placeholder_page(&mut doc, font, *index));
            }
        }
    }

    for &id in &kids {
        doc.get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| merge_err(output, e))?
            .set("Parent", pages_id);
    }

    let count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.prune_objects();
    doc.renumber_objects();

    write_atomic(&mut doc, output, abandoned)?;
    Ok(count)
}

/// Move every object of `src` into `dst` and return its page ids in order.
fn import_pages(dst: &mut Document, mut src: Document) -> Result<Vec<ObjectId>, lopdf::Error> {
    src.renumber_objects_with(dst.max_id + 1);
    let page_ids: Vec<ObjectId> = src.get_pages().into_values().collect();
    for &id in &page_ids {
        flatten_inherited(&mut src, id)?;
    }
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    Ok(page_ids)
}

/// Copy inherited attributes from the page's ancestors onto the page.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let page = doc.get_object(page_id).and_then(Object::as_dict)?;
    let mut missing: Vec<&[u8]> = INHERITABLE.iter().copied().filter(|k| !page.has(k)).collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut found: Vec<(Vec<u8>, Object)> = Vec::new();

    let mut depth = 0;
    while let Some(id) = parent {
        if missing.is_empty() || depth == MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_object(id).and_then(Object::as_dict)?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    if !found.is_empty() {
        let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        for (key, value) in found {
            page.set(key, value);
        }
    }
    Ok(())
}

fn placeholder_page(doc: &mut Document, font_id: ObjectId, index: usize) -> ObjectId {
    let content = format!("BT /F1 24 Tf 72 720 Td (Section {} unavailable) Tj ET", index).into_bytes();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "MediaBox" => PLACEHOLDER_BOX.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
    })
}

fn write_atomic(doc: &mut Document, output: &Path, abandoned: &AtomicBool) -> Result<(), BinderError> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| BinderError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| BinderError::io(parent, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        doc.save_to(&mut writer).map_err(|e| BinderError::io(output, e))?;
        writer.flush().map_err(|e| BinderError::io(output, e))?;
    }
    if abandoned.load(Ordering::SeqCst) {
        debug!("{}: merge abandoned, discarding", output.display());
        return Err(merge_err(output, "abandoned before completion"));
    }
    tmp.persist(output).map_err(|e| BinderError::io(output, e.error))?;
    Ok(())
}

fn merge_err(output: &Path, detail: impl std::fmt::Display) -> BinderError {
    BinderError::Merge {
        path: output.to_path_buf(),
        detail: detail.to_string(),
    }
}
