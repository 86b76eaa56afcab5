use crate::strings::TranslationUnit;

/// Units sent together in one request, as positions into the unit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    positions: Vec<usize>,
}

impl Batch {
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn units<'a>(&self, units: &'a [TranslationUnit]) -> Vec<&'a TranslationUnit> {
        self.positions
            .iter()
            .filter_map(|position| units.get(*position))
            .collect()
    }
}

pub fn needs_translation(unit: &TranslationUnit, skip_translated: bool) -> bool {
    if !unit.translatable || unit.source_text.trim().is_empty() {
        return false;
    }
    !(skip_translated && unit.is_translated())
}

/// Splits the units that need translating into batches of at most
/// `bunch_size`, in file order. Without a bunch size (or below 1) every unit
/// gets its own batch.
pub fn plan(units: &[TranslationUnit], bunch_size: Option<usize>, skip_translated: bool) -> Vec<Batch> {
    let pending = units
        .iter()
        .enumerate()
        .filter(|(_, unit)| needs_translation(unit, skip_translated))
        .map(|(position, _)| position)
        .collect::<Vec<_>>();
    let size = bunch_size.filter(|size| *size >= 1).unwrap_or(1);
    pending
        .chunks(size)
        .map(|chunk| Batch {
            positions: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(count: usize) -> Vec<TranslationUnit> {
        (0..count)
            .map(|index| TranslationUnit::new(format!("key{}", index), format!("Text {}", index)))
            .collect()
    }

    fn flatten(batches: &[Batch]) -> Vec<usize> {
        batches
            .iter()
            .flat_map(|batch| batch.positions().iter().copied())
            .collect()
    }

    #[test]
    fn unbatched_mode_puts_one_unit_per_batch() {
        let units = units(4);
        for bunch_size in [None, Some(0)] {
            let batches = plan(&units, bunch_size, true);
            assert_eq!(batches.len(), 4);
            assert!(batches.iter().all(|batch| batch.len() == 1));
            assert_eq!(flatten(&batches), [0, 1, 2, 3]);
        }
    }

    #[test]
    fn batches_are_contiguous_and_bounded() {
        let units = units(7);
        for bunch_size in 1..=8 {
            let batches = plan(&units, Some(bunch_size), true);
            assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= bunch_size));
            assert_eq!(flatten(&batches), (0..7).collect::<Vec<_>>());
            assert_eq!(batches.len(), 7usize.div_ceil(bunch_size));
        }
        let batches = plan(&units, Some(3), true);
        let sizes = batches.iter().map(Batch::len).collect::<Vec<_>>();
        assert_eq!(sizes, [3, 3, 1]);
    }

    #[test]
    fn skip_translated_filters_existing_translations() {
        let mut units = units(5);
        units[1].existing_translation = Some("Traduit".to_string());
        units[3].existing_translation = Some("Traduit".to_string());
        units[4].existing_translation = Some(String::new());

        let batches = plan(&units, Some(2), true);
        assert_eq!(flatten(&batches), [0, 2, 4]);
        assert_eq!(batches[0].positions(), [0, 2]);

        let batches = plan(&units, Some(2), false);
        assert_eq!(flatten(&batches), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn untranslatable_and_empty_units_are_never_planned() {
        let mut units = units(3);
        units[0].translatable = false;
        units[2].source_text = "  ".to_string();
        let batches = plan(&units, None, false);
        assert_eq!(flatten(&batches), [1]);
    }

    #[test]
    fn batch_units_resolve_positions() {
        let units = units(3);
        let batches = plan(&units, Some(2), true);
        let keys = batches[0]
            .units(&units)
            .iter()
            .map(|unit| unit.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, ["key0", "key1"]);
    }

    #[test]
    fn empty_input_plans_nothing() {
        assert!(plan(&[], Some(10), true).is_empty());
    }
}
