//! Built-in commands and their default bindings

use anyhow::{bail, Result};
use tabula_core::{CommandRegistry, MouseAction, Scope, SessionContext};

use crate::views::{error_view, errors_view, TextView};

/// Rows moved per wheel notch
const SCROLL_ROWS: isize = 3;

/// Registry with every built-in command bound
pub fn builtin_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_session(&mut registry);
    register_navigation(&mut registry);
    register_mouse(&mut registry);
    registry
}

fn register_session(registry: &mut CommandRegistry) {
    registry.add("quit-view", "close the current view", Scope::Global, &["q"], |ctx| {
        ctx.pop();
        Ok(())
    });

    registry.add("error-recent", "show the most recent error", Scope::Global, &["^E"], |ctx| {
        let view = ctx.last_error().map(error_view);
        match view {
            Some(view) => {
                ctx.push(Box::new(view));
            }
            None => ctx.status("no error"),
        }
        Ok(())
    });

    registry.add("errors-all", "show every recorded error", Scope::Global, &["g^E"], |ctx| {
        if ctx.errors().is_empty() {
            ctx.status("no error");
        } else {
            let view = errors_view(ctx.errors());
            ctx.push(Box::new(view));
        }
        Ok(())
    });

    registry.add("swap-pane", "make the other pane active", Scope::Global, &["^I"], |ctx| {
        if !ctx.switch_pane() {
            ctx.status("no other pane");
        }
        Ok(())
    });

    registry.add(
        "split-window",
        "move the view underneath into the other pane",
        Scope::Global,
        &["Z"],
        split_window,
    );

    registry.add("unsplit-window", "show only the active pane", Scope::Global, &["gZ"], |ctx| {
        ctx.set_split_percent(0);
        Ok(())
    });

    registry.add("reload", "re-read the current file", Scope::Global, &["^R"], |ctx| {
        let reloaded = with_text(ctx, |view| Ok(view.reload()))?;
        if !reloaded {
            ctx.status("nothing to reload");
        }
        Ok(())
    });
}

fn register_navigation(registry: &mut CommandRegistry) {
    registry.add("cursor-down", "next line", Scope::Global, &["j", "KEY_DOWN"], |ctx| {
        with_text(ctx, |view| {
            view.move_cursor(1);
            Ok(())
        })
    });
    registry.add("cursor-up", "previous line", Scope::Global, &["k", "KEY_UP"], |ctx| {
        with_text(ctx, |view| {
            view.move_cursor(-1);
            Ok(())
        })
    });
    registry.add("page-down", "next screen", Scope::Global, &["KEY_NPAGE", "^F"], |ctx| {
        with_text(ctx, |view| {
            view.page(1);
            Ok(())
        })
    });
    registry.add("page-up", "previous screen", Scope::Global, &["KEY_PPAGE", "^B"], |ctx| {
        with_text(ctx, |view| {
            view.page(-1);
            Ok(())
        })
    });
    registry.add("go-top", "first line", Scope::Global, &["gk", "KEY_HOME"], |ctx| {
        with_text(ctx, |view| {
            view.go_top();
            Ok(())
        })
    });
    registry.add("go-bottom", "last line", Scope::Global, &["gj", "KEY_END"], |ctx| {
        with_text(ctx, |view| {
            view.go_bottom();
            Ok(())
        })
    });
    let text = Scope::view(crate::views::text::KIND);
    registry.add("toggle-wrap", "wrap long lines to the pane width", text, &["^W"], |ctx| {
        let wrapped = with_text(ctx, |view| Ok(view.toggle_wrap()))?;
        ctx.status(if wrapped { "wrap on" } else { "wrap off" });
        Ok(())
    });
    registry.add("scroll-down", "scroll down a few lines", Scope::Global, &[], |ctx| {
        with_text(ctx, |view| {
            view.move_cursor(SCROLL_ROWS);
            Ok(())
        })
    });
    registry.add("scroll-up", "scroll up a few lines", Scope::Global, &[], |ctx| {
        with_text(ctx, |view| {
            view.move_cursor(-SCROLL_ROWS);
            Ok(())
        })
    });
}

fn register_mouse(registry: &mut CommandRegistry) {
    registry.bind_mouse(
        Scope::Global,
        "BUTTON4_PRESSED",
        MouseAction::Commands(vec!["scroll-up".into()]),
    );
    registry.bind_mouse(
        Scope::Global,
        "BUTTON5_PRESSED",
        MouseAction::Commands(vec!["scroll-down".into()]),
    );
    registry.bind_mouse(
        Scope::Global,
        "BUTTON1_PRESSED",
        MouseAction::handler(|ctx, target| {
            let Some(view) = ctx.top_view_mut(target.pane) else {
                return Ok(());
            };
            if let Some(text) = view.as_any_mut().downcast_mut::<TextView>() {
                text.click(target.y);
            }
            Ok(())
        }),
    );
}

/// Move the view beneath the active one into the other pane and split
fn split_window(ctx: &mut SessionContext) -> Result<()> {
    let active = ctx.active_pane();
    let Some(below) = ctx.stack(active).iter().nth(1).map(|entry| entry.id) else {
        ctx.status("nothing to split");
        return Ok(());
    };
    ctx.move_to(below, active.other());
    if ctx.split_percent() == 0 {
        ctx.set_split_percent(50);
    }
    Ok(())
}

/// Run `f` on the active view when it is a text view
fn with_text<T>(ctx: &mut SessionContext, f: impl FnOnce(&mut TextView) -> Result<T>) -> Result<T> {
    let Some(view) = ctx.active_view_mut() else {
        bail!("no active view");
    };
    let name = view.name().to_string();
    match view.as_any_mut().downcast_mut::<TextView>() {
        Some(text) => f(text),
        None => bail!("{name} is not a text view"),
    }
}
