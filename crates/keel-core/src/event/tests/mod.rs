#[cfg(test)]
mod message_tests;

#[cfg(test)]
mod tests {
    use crate::event::Priority;

    #[test]
    fn test_priority_default() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_values() {
        assert_eq!(Priority::Low as u32, 0);
        assert_eq!(Priority::Normal as u32, 1);
        assert_eq!(Priority::High as u32, 2);
        assert_eq!(Priority::Critical as u32, 3);
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Critical.is_top_tier());
        assert!(!Priority::High.is_top_tier());
    }
}
