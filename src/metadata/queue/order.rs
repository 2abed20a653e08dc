use std::collections::HashSet;

use indexmap::IndexMap;

use crate::{
    metadata::typesystem::{ClassDescriptorRc, ClassRegistry, ROOT_CLASS_NAME},
    Error::RecursionLimit,
    Result,
};

/// Order annotated classes so every class follows its superclass.
///
/// First adds every mapped superclass reachable from the input, walking up each superclass
/// chain until a class is neither an entity nor a mapped superclass. Then emits the working
/// set in pre-order: a class's superclass (if it is part of the working set) before the class
/// itself. Each class is emitted once, however often it appears in the input.
///
/// ## Arguments
/// * 'annotated'   - Classes in submission order, duplicates allowed
/// * 'classes'     - Registry used to walk superclass chains
/// * 'max_depth'   - Longest superclass chain accepted
///
/// # Errors
/// Returns [`crate::Error::RecursionLimit`] if a superclass chain is longer than `max_depth`,
/// which only happens for cyclic class descriptors.
pub fn order_and_fill_hierarchy(
    annotated: &[ClassDescriptorRc],
    classes: &ClassRegistry,
    max_depth: usize,
) -> Result<Vec<ClassDescriptorRc>> {
    let mut working: IndexMap<String, ClassDescriptorRc> = IndexMap::new();

    for class in annotated {
        working
            .entry(class.name.clone())
            .or_insert_with(|| class.clone());

        let mut depth = 0;
        let mut current = classes.superclass_of(class);
        while let Some(superclass) = current {
            if !superclass.is_entity() && !superclass.is_mapped_superclass() {
                break;
            }
            depth += 1;
            if depth > max_depth {
                return Err(RecursionLimit(max_depth));
            }
            current = classes.superclass_of(&superclass);
            working
                .entry(superclass.name.clone())
                .or_insert(superclass);
        }
    }

    let mut ordered = Vec::with_capacity(working.len());
    let mut emitted = HashSet::with_capacity(working.len());
    for class in working.values() {
        order_hierarchy(class, &working, &mut ordered, &mut emitted, 0, max_depth)?;
    }

    Ok(ordered)
}

fn order_hierarchy(
    class: &ClassDescriptorRc,
    working: &IndexMap<String, ClassDescriptorRc>,
    ordered: &mut Vec<ClassDescriptorRc>,
    emitted: &mut HashSet<String>,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    if class.name == ROOT_CLASS_NAME || emitted.contains(&class.name) {
        return Ok(());
    }
    if depth > max_depth {
        return Err(RecursionLimit(max_depth));
    }

    if let Some(superclass) = class
        .superclass
        .as_deref()
        .and_then(|name| working.get(name))
    {
        order_hierarchy(superclass, working, ordered, emitted, depth + 1, max_depth)?;
    }

    if emitted.insert(class.name.clone()) {
        ordered.push(class.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::typesystem::{ClassAnnotation, ClassDescriptor},
        Error,
    };

    fn registry() -> ClassRegistry {
        let classes = ClassRegistry::new();
        classes.register(ClassDescriptor::new("a.Base").annotated(ClassAnnotation::Entity { name: None }));
        classes.register(
            ClassDescriptor::new("a.Mid")
                .extends("a.Base")
                .annotated(ClassAnnotation::Entity { name: None }),
        );
        classes.register(
            ClassDescriptor::new("a.Leaf")
                .extends("a.Mid")
                .annotated(ClassAnnotation::Entity { name: None }),
        );
        classes
    }

    fn names(ordered: &[ClassDescriptorRc]) -> Vec<&str> {
        ordered.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_permutations_linearize() {
        let classes = registry();
        let get = |name: &str| classes.get(name).unwrap();

        for permutation in [
            ["a.Leaf", "a.Base", "a.Mid"],
            ["a.Mid", "a.Leaf", "a.Base"],
            ["a.Base", "a.Mid", "a.Leaf"],
            ["a.Leaf", "a.Mid", "a.Base"],
        ] {
            let input: Vec<_> = permutation.iter().map(|n| get(n)).collect();
            let ordered = order_and_fill_hierarchy(&input, &classes, 16).unwrap();
            assert_eq!(names(&ordered), vec!["a.Base", "a.Mid", "a.Leaf"]);
        }
    }

    #[test]
    fn test_duplicates_emitted_once() {
        let classes = registry();
        let leaf = classes.get("a.Leaf").unwrap();
        let base = classes.get("a.Base").unwrap();
        let input = vec![leaf.clone(), base, leaf];
        let ordered = order_and_fill_hierarchy(&input, &classes, 16).unwrap();
        assert_eq!(names(&ordered), vec!["a.Base", "a.Mid", "a.Leaf"]);
    }

    #[test]
    fn test_mapped_superclass_filled() {
        let classes = ClassRegistry::new();
        classes.register(ClassDescriptor::new("a.Plain"));
        classes.register(
            ClassDescriptor::new("a.Audited")
                .extends("a.Plain")
                .annotated(ClassAnnotation::MappedSuperclass),
        );
        classes.register(
            ClassDescriptor::new("a.Order")
                .extends("a.Audited")
                .annotated(ClassAnnotation::Entity { name: None }),
        );

        let input = vec![classes.get("a.Order").unwrap()];
        let ordered = order_and_fill_hierarchy(&input, &classes, 16).unwrap();
        assert_eq!(names(&ordered), vec!["a.Audited", "a.Order"]);
    }

    #[test]
    fn test_cycle_hits_limit() {
        let classes = ClassRegistry::new();
        classes.register(
            ClassDescriptor::new("a.X")
                .extends("a.Y")
                .annotated(ClassAnnotation::MappedSuperclass),
        );
        classes.register(
            ClassDescriptor::new("a.Y")
                .extends("a.X")
                .annotated(ClassAnnotation::MappedSuperclass),
        );

        let input = vec![classes.get("a.X").unwrap()];
        let err = order_and_fill_hierarchy(&input, &classes, 8).unwrap_err();
        assert!(matches!(err, Error::RecursionLimit(8)));
    }
}
