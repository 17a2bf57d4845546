// flowline/src/core/describe.rs

//! Display names for filters. Used for step stacks, log fields and the
//! pipeline snapshot only; nothing in the engine branches on them.

/// Label used when a filter has no usable name.
pub fn positional_label(position: usize) -> String {
  format!("step[{}]", position)
}

/// Derives a display name for the callable type `F`, or `None` when the type
/// is anonymous (closures, async blocks).
pub fn callable_name<F: ?Sized>() -> Option<String> {
  name_from_type_path(std::any::type_name::<F>())
}

/// Like [`callable_name`], falling back to `fallback` for anonymous callables.
pub fn describe_callable<F: ?Sized>(fallback: &str) -> String {
  callable_name::<F>().unwrap_or_else(|| fallback.to_string())
}

pub(crate) fn name_from_type_path(type_path: &str) -> Option<String> {
  if type_path.contains("{{closure}}") || type_path.contains("{{") {
    return None;
  }
  // Generic arguments would otherwise leak `::` separators into the last segment.
  let without_generics = match type_path.find('<') {
    Some(idx) => &type_path[..idx],
    None => type_path,
  };
  let last = without_generics.rsplit("::").next().unwrap_or(without_generics).trim();
  if last.is_empty() || last.starts_with('&') || last.starts_with("dyn ") || last.starts_with('(') {
    return None;
  }
  Some(last.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn normalize_order(_: u32) {}

  #[test]
  fn named_fn_items_use_their_own_name() {
    fn validate_order() {}
    assert_eq!(describe_callable_of(validate_order, "step[1]"), "validate_order");
    assert_eq!(describe_callable_of(normalize_order, "step[1]"), "normalize_order");
  }

  #[test]
  fn closures_fall_back_to_the_positional_label() {
    let anonymous = |x: u32| x + 1;
    assert_eq!(describe_callable_of(anonymous, &positional_label(3)), "step[3]");
  }

  #[test]
  fn generic_paths_keep_the_base_name() {
    assert_eq!(name_from_type_path("my_app::filters::Dedupe<alloc::string::String>").as_deref(), Some("Dedupe"));
    assert_eq!(name_from_type_path("&str"), None);
  }

  fn describe_callable_of<F>(_: F, fallback: &str) -> String {
    describe_callable::<F>(fallback)
  }
}
