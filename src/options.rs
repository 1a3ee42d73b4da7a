//! Per-navigation options.

/// Special options that apply to a single navigation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavOptions {
    single_top: bool,
    restore_state: bool,
    pop_up_to_id: Option<String>,
    pop_up_to_route: Option<String>,
    pop_up_to_inclusive: bool,
    pop_up_to_save_state: bool,
    enter_anim: Option<String>,
    exit_anim: Option<String>,
    pop_enter_anim: Option<String>,
    pop_exit_anim: Option<String>,
}

impl NavOptions {
    pub fn builder() -> NavOptionsBuilder {
        NavOptionsBuilder::default()
    }

    /// Whether at most one copy of the target may sit on top of the stack.
    pub fn should_launch_single_top(&self) -> bool {
        self.single_top
    }

    /// Whether a previously saved stack for the target should be restored.
    pub fn should_restore_state(&self) -> bool {
        self.restore_state
    }

    pub fn pop_up_to_id(&self) -> Option<&str> {
        self.pop_up_to_id.as_deref()
    }

    pub fn pop_up_to_route(&self) -> Option<&str> {
        self.pop_up_to_route.as_deref()
    }

    pub fn is_pop_up_to_inclusive(&self) -> bool {
        self.pop_up_to_inclusive
    }

    pub fn should_pop_up_to_save_state(&self) -> bool {
        self.pop_up_to_save_state
    }

    /// Animation resource names carried through to the display layer.
    /// The engine never interprets them.
    pub fn enter_anim(&self) -> Option<&str> {
        self.enter_anim.as_deref()
    }

    pub fn exit_anim(&self) -> Option<&str> {
        self.exit_anim.as_deref()
    }

    pub fn pop_enter_anim(&self) -> Option<&str> {
        self.pop_enter_anim.as_deref()
    }

    pub fn pop_exit_anim(&self) -> Option<&str> {
        self.pop_exit_anim.as_deref()
    }
}

/// Builder for [`NavOptions`].
#[derive(Debug, Clone, Default)]
pub struct NavOptionsBuilder {
    options: NavOptions,
}

impl NavOptionsBuilder {
    pub fn launch_single_top(mut self, single_top: bool) -> Self {
        self.options.single_top = single_top;
        self
    }

    pub fn restore_state(mut self, restore_state: bool) -> Self {
        self.options.restore_state = restore_state;
        self
    }

    /// Pop all destinations off the back stack until `id` is found, before
    /// navigating. Resets `inclusive` and `save_state`.
    pub fn pop_up_to_id(mut self, id: impl Into<String>) -> Self {
        self.options.pop_up_to_id = Some(id.into());
        self.options.pop_up_to_route = None;
        self.options.pop_up_to_inclusive = false;
        self.options.pop_up_to_save_state = false;
        self
    }

    /// Like [`NavOptionsBuilder::pop_up_to_id`], addressed by route.
    pub fn pop_up_to_route(mut self, route: impl Into<String>) -> Self {
        self.options.pop_up_to_route = Some(route.into());
        self.options.pop_up_to_id = None;
        self.options.pop_up_to_inclusive = false;
        self.options.pop_up_to_save_state = false;
        self
    }

    /// Whether the pop-up-to destination itself is popped too.
    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.options.pop_up_to_inclusive = inclusive;
        self
    }

    /// Whether the popped destinations’ state is saved for later restoration.
    pub fn save_state(mut self, save_state: bool) -> Self {
        self.options.pop_up_to_save_state = save_state;
        self
    }

    pub fn enter_anim(mut self, name: impl Into<String>) -> Self {
        self.options.enter_anim = Some(name.into());
        self
    }

    pub fn exit_anim(mut self, name: impl Into<String>) -> Self {
        self.options.exit_anim = Some(name.into());
        self
    }

    pub fn pop_enter_anim(mut self, name: impl Into<String>) -> Self {
        self.options.pop_enter_anim = Some(name.into());
        self
    }

    pub fn pop_exit_anim(mut self, name: impl Into<String>) -> Self {
        self.options.pop_exit_anim = Some(name.into());
        self
    }

    pub fn build(self) -> NavOptions {
        self.options
    }
}

#[test]
fn test_pop_up_to_resets_flags() {
    let options = NavOptions::builder()
        .pop_up_to_id("home")
        .inclusive(true)
        .save_state(true)
        .pop_up_to_route("profile")
        .build();
    assert_eq!(options.pop_up_to_id(), None);
    assert_eq!(options.pop_up_to_route(), Some("profile"));
    assert!(!options.is_pop_up_to_inclusive());
    assert!(!options.should_pop_up_to_save_state());
}
