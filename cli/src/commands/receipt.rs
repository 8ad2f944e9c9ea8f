use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use std::process;

use super::helpers::{print_pantry_table, report_push};
use super::{Chef, Engine};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Read a receipt photo and merge the recognised items into the pantry.
pub(crate) async fn cmd_receipt(
    engine: &mut Engine,
    chef: &Chef,
    image: &Path,
    json: bool,
) -> Result<()> {
    let Some(mime_type) = mime_for_path(image) else {
        bail!(
            "Unsupported image type '{}'. Use jpg, png, webp or heic",
            image.display()
        );
    };
    let bytes =
        std::fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        bail!("Image is larger than 10 MB");
    }

    let language = engine.settings().language.clone();
    let items = chef
        .analyze_receipt(&STANDARD.encode(&bytes), mime_type, &language)
        .await?;

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No groceries found on this receipt");
        }
        process::exit(2);
    }

    let outcome = engine.merge_pantry_items(items.clone()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        println!("Added {} item(s) from the receipt:", items.len());
        print_pantry_table(&items);
        report_push(outcome);
    }
    Ok(())
}
