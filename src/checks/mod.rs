use crate::discord::Context;
use crate::discord::Error;

/// Checks whether the user is in the admin list.
pub async fn is_admin(ctx: Context<'_>) -> Result<bool, Error> {
    let is_admin = ctx
        .data()
        .state
        .lock()
        .await
        .admins()
        .contains(&ctx.author().id);

    if is_admin || ctx.data().settings.owner == ctx.author().id.get() {
        Ok(true)
    } else {
        ctx.say("You need to be an Admin to execute this command.")
            .await?;
        Ok(false)
    }
}

/// Checks whether the user is the bot owner.
pub async fn is_owner(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.data().settings.owner == ctx.author().id.get() {
        Ok(true)
    } else {
        ctx.say("You need to be the bot owner to execute this command.")
            .await?;
        Ok(false)
    }
}
