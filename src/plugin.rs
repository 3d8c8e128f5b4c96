// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! [`Plugin`]: a unit of setup an [`crate::app::App`] can absorb. `build`
//! runs when the plugin is added; `cleanup` runs when the owning `App` is
//! dropped.

use std::any::type_name;

use crate::app::App;
use crate::error::Result;

pub trait Plugin: Send + Sync + 'static {
    /// Called once, in `App::add_plugin`.
    fn build(&self, app: &mut App);

    /// Called once, when the owning `App` is dropped. An `Err` is logged by
    /// the caller and never raised — `Drop` can't propagate failures, so
    /// this is strictly a diagnostic. Default does nothing.
    fn cleanup(&self, _app: &mut App) -> Result<()> {
        Ok(())
    }

    /// Identity used to reject duplicate `is_unique` plugins. Defaults to
    /// the plugin's type name.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Whether a second `add_plugin` call with the same `name` should be
    /// rejected. Defaults to true.
    fn is_unique(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::error::EcsError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Greeter;
    impl Plugin for Greeter {
        fn build(&self, app: &mut App) {
            app.world_mut().insert_resource(String::from("hello"));
        }
    }

    #[test]
    fn build_runs_on_add() {
        let mut app = App::empty();
        app.add_plugin(Greeter);
        assert_eq!(app.world().resource::<String>().unwrap(), "hello");
    }

    #[test]
    fn duplicate_unique_plugin_is_rejected() {
        let mut app = App::empty();
        app.add_plugin(Greeter);
        assert!(app.add_plugin(Greeter).is_err());
    }

    struct CleansUp(Arc<AtomicBool>);
    impl Plugin for CleansUp {
        fn build(&self, _app: &mut App) {}

        fn cleanup(&self, _app: &mut App) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn cleanup_runs_when_the_app_is_dropped() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut app = App::empty();
        app.add_plugin(CleansUp(ran.clone())).unwrap();
        drop(app);
        assert!(ran.load(Ordering::SeqCst));
    }

    struct FailsCleanup;
    impl Plugin for FailsCleanup {
        fn build(&self, _app: &mut App) {}

        fn cleanup(&self, _app: &mut App) -> Result<()> {
            Err(EcsError::ResourceNotFound("oops"))
        }
    }

    #[test]
    fn a_failing_cleanup_is_swallowed_not_propagated() {
        let mut app = App::empty();
        app.add_plugin(FailsCleanup).unwrap();
        drop(app);
    }
}
