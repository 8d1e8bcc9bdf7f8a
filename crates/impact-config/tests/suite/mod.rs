mod loading;
mod precedence;
